// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::catstream::{
    inetstack::test_helpers::{
        self,
        ALICE_IPV4,
        BOB_IPV4,
        CARRIE_IPV4,
    },
    Config,
    ConnectionStats,
    Engine,
    LinkConfig,
    QDesc,
    TcpConfig,
    TcpPeer,
};
use ::crc::{
    Crc,
    Digest,
    CRC_32_CKSUM,
};
use ::std::{
    net::SocketAddrV4,
    str::FromStr,
    time::{
        Duration,
        Instant,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

const PORT_BASE: u16 = 7000;

static CHECKSUM: Crc<u32> = Crc::<u32>::new(&CRC_32_CKSUM);

//======================================================================================================================
// Helpers
//======================================================================================================================

/// One side of a transfer: what was written, and a running checksum of what was read.
struct Transfer<'a> {
    peer: &'a TcpPeer,
    qd: QDesc,
    outgoing: Vec<u8>,
    written: usize,
    digest: Digest<'static, u32>,
    received: usize,
}

impl<'a> Transfer<'a> {
    fn new(peer: &'a TcpPeer, qd: QDesc, outgoing: Vec<u8>) -> Self {
        Self {
            peer,
            qd,
            outgoing,
            written: 0,
            digest: CHECKSUM.digest(),
            received: 0,
        }
    }

    /// Writes what the send buffer takes and reads whatever arrived.
    fn pump(&mut self) -> Result<()> {
        if self.written < self.outgoing.len() {
            self.written += self.peer.write(self.qd, &self.outgoing[self.written..])?;
        }
        let mut buf: [u8; 1024] = [0; 1024];
        loop {
            let n: usize = self.peer.read(self.qd, &mut buf)?;
            if n == 0 {
                return Ok(());
            }
            self.digest.update(&buf[..n]);
            self.received += n;
        }
    }

    fn checksum(self) -> u32 {
        self.digest.finalize()
    }
}

/// Pseudo-random payload, different for every `salt`.
fn payload(size: usize, salt: u8) -> Vec<u8> {
    (0..size).map(|i| ((i * 7 + i / 251) as u8) ^ salt).collect()
}

fn listen(peer: &TcpPeer, port: u16, backlog: usize) -> Result<QDesc> {
    let qd: QDesc = peer.socket()?;
    peer.bind(qd, port)?;
    peer.listen(qd, backlog)?;
    Ok(qd)
}

/// Connects `client` to `server` and accepts the connection.
fn connect(
    engine: &mut Engine,
    server: &TcpPeer,
    listen_qd: QDesc,
    client: &TcpPeer,
    port: u16,
) -> Result<(QDesc, QDesc)> {
    let client_qd: QDesc = client.socket()?;
    client.connect(client_qd, SocketAddrV4::new(server.local_ipv4_addr(), port))?;
    if !engine.run_until(Duration::from_secs(30), |_| client.is_connected(client_qd)) {
        anyhow::bail!("connection to port {} timed out", port);
    }
    loop {
        match server.accept(listen_qd) {
            Ok(server_qd) => return Ok((server_qd, client_qd)),
            Err(e) if e.errno == libc::EAGAIN => {
                if !engine.step(engine.now() + Duration::from_secs(1)) {
                    anyhow::bail!("accept on port {} timed out", port);
                }
            },
            Err(e) => anyhow::bail!("accept failed: {:?}", e),
        }
    }
}

//======================================================================================================================
// Tests
//======================================================================================================================

/// Sends data both ways at once over a lossy link and compares checksums.
#[test]
fn tcp_bidirectional_transfer_over_lossy_link() -> Result<()> {
    let link: LinkConfig = LinkConfig::default().set_loss_rate(0.1);
    let mut engine: Engine = Engine::new(Instant::now(), link, 42);
    let server: TcpPeer = engine.add_peer(BOB_IPV4, test_helpers::test_tcp_config());
    let client: TcpPeer = engine.add_peer(ALICE_IPV4, test_helpers::test_tcp_config());

    let listen_qd: QDesc = listen(&server, PORT_BASE, 4)?;
    let (server_qd, client_qd): (QDesc, QDesc) = connect(&mut engine, &server, listen_qd, &client, PORT_BASE)?;

    let upload: Vec<u8> = payload(40_000, 0x11);
    let download: Vec<u8> = payload(25_000, 0x22);
    let upload_crc: u32 = CHECKSUM.checksum(&upload);
    let download_crc: u32 = CHECKSUM.checksum(&download);

    let mut client_side: Transfer = Transfer::new(&client, client_qd, upload);
    let mut server_side: Transfer = Transfer::new(&server, server_qd, download);
    let mut failure: Option<anyhow::Error> = None;
    let done: bool = engine.run_until(Duration::from_secs(300), |_| {
        if let Err(e) = client_side.pump().and_then(|_| server_side.pump()) {
            failure = Some(e);
            return true;
        }
        client_side.received == 25_000 && server_side.received == 40_000
    });
    if let Some(e) = failure {
        return Err(e);
    }
    assert!(done);

    assert_eq!(server_side.checksum(), upload_crc);
    assert_eq!(client_side.checksum(), download_crc);
    assert!(engine.network().stats().lost > 0);
    Ok(())
}

/// Repeats an upload over many seeds of a link that loses, duplicates and reorders datagrams.
#[test]
fn tcp_transfer_survives_every_seed() -> Result<()> {
    let link: LinkConfig = LinkConfig::default()
        .set_loss_rate(0.2)
        .set_duplicate_rate(0.1)
        .set_reorder_rate(0.2);
    for seed in 0..24 {
        let mut engine: Engine = Engine::new(Instant::now(), link.clone(), seed);
        let server: TcpPeer = engine.add_peer(BOB_IPV4, test_helpers::test_tcp_config());
        let client: TcpPeer = engine.add_peer(ALICE_IPV4, test_helpers::test_tcp_config());
        let listen_qd: QDesc = listen(&server, PORT_BASE + 4, 1)?;
        let (server_qd, client_qd): (QDesc, QDesc) = connect(&mut engine, &server, listen_qd, &client, PORT_BASE + 4)?;

        let data: Vec<u8> = payload(40_000, seed as u8);
        let mut upload: Transfer = Transfer::new(&client, client_qd, data.clone());
        let mut sink: Transfer = Transfer::new(&server, server_qd, Vec::new());
        let mut failure: Option<anyhow::Error> = None;
        let done: bool = engine.run_until(Duration::from_secs(600), |_| {
            if let Err(e) = upload.pump().and_then(|_| sink.pump()) {
                failure = Some(e);
                return true;
            }
            sink.received == data.len()
        });
        if let Some(e) = failure {
            return Err(e.context(format!("seed {}", seed)));
        }
        if !done {
            anyhow::bail!(
                "seed {}: {} of {} bytes received, client {:?}",
                seed,
                sink.received,
                data.len(),
                client.stats(client_qd)?
            );
        }
        assert_eq!(sink.checksum(), CHECKSUM.checksum(&data), "seed {}", seed);
    }
    Ok(())
}

/// Serves three clients on one listening socket over a link that also duplicates and reorders.
#[test]
fn tcp_many_clients_one_listener() -> Result<()> {
    let link: LinkConfig = LinkConfig::default()
        .set_loss_rate(0.05)
        .set_duplicate_rate(0.05)
        .set_reorder_rate(0.05);
    let mut engine: Engine = Engine::new(Instant::now(), link, 7);
    let server: TcpPeer = engine.add_peer(BOB_IPV4, test_helpers::test_tcp_config());
    let alice: TcpPeer = engine.add_peer(ALICE_IPV4, test_helpers::test_tcp_config());
    let carrie: TcpPeer = engine.add_peer(CARRIE_IPV4, test_helpers::test_tcp_config());

    let listen_qd: QDesc = listen(&server, PORT_BASE + 1, 8)?;
    let mut clients: Vec<(QDesc, QDesc, &TcpPeer, u8)> = Vec::new();
    for (salt, client) in [(1, &alice), (2, &carrie), (3, &alice)] {
        let (server_qd, client_qd): (QDesc, QDesc) = connect(&mut engine, &server, listen_qd, client, PORT_BASE + 1)?;
        clients.push((server_qd, client_qd, client, salt));
    }
    assert_eq!(server.connection_count(), 3);

    let mut uploads: Vec<Transfer> = Vec::new();
    let mut sinks: Vec<Transfer> = Vec::new();
    for (server_qd, client_qd, client, salt) in clients.iter().copied() {
        uploads.push(Transfer::new(client, client_qd, payload(12_000, salt)));
        sinks.push(Transfer::new(&server, server_qd, Vec::new()));
    }

    let done: bool = engine.run_until(Duration::from_secs(300), |_| {
        for transfer in uploads.iter_mut().chain(sinks.iter_mut()) {
            transfer.pump().expect("transfer should make progress");
        }
        sinks.iter().all(|sink| sink.received == 12_000)
    });
    assert!(done);

    for ((_, _, _, salt), sink) in clients.iter().zip(sinks) {
        assert_eq!(sink.checksum(), CHECKSUM.checksum(&payload(12_000, *salt)));
    }
    Ok(())
}

/// Runs a transfer with the stack configured from YAML, with the fixed-window congestion controller.
#[test]
fn tcp_transfer_with_yaml_config() -> Result<()> {
    let config: Config = Config::from_str(
        r#"
tcp:
  mss: 500
  receive_buffer_size: 4000
  send_buffer_size: 4000
  handshake_timeout_ms: 50
  initial_rto_ms: 50
  initial_cwnd: 4
  congestion_control: none
"#,
    )?;
    let tcp_config: TcpConfig = config.tcp_config()?;
    assert_eq!(tcp_config.get_mss(), 500);

    let mut engine: Engine = Engine::new(Instant::now(), LinkConfig::default().set_loss_rate(0.02), 3);
    let server: TcpPeer = engine.add_peer(BOB_IPV4, tcp_config.clone());
    let client: TcpPeer = engine.add_peer(ALICE_IPV4, tcp_config);
    let listen_qd: QDesc = listen(&server, PORT_BASE + 2, 1)?;
    let (server_qd, client_qd): (QDesc, QDesc) = connect(&mut engine, &server, listen_qd, &client, PORT_BASE + 2)?;

    let data: Vec<u8> = payload(20_000, 0x33);
    let mut upload: Transfer = Transfer::new(&client, client_qd, data.clone());
    let mut sink: Transfer = Transfer::new(&server, server_qd, Vec::new());
    let done: bool = engine.run_until(Duration::from_secs(120), |_| {
        upload.pump().expect("upload should make progress");
        sink.pump().expect("download should make progress");
        sink.received == data.len()
    });
    assert!(done);
    assert_eq!(sink.checksum(), CHECKSUM.checksum(&data));

    // The window never grows past its initial size.
    let stats: ConnectionStats = client.stats(client_qd)?.expect("connection should be up");
    assert_eq!(stats.cwnd, 4.0);
    Ok(())
}

/// Closes both ends of a connection and checks that every resource is released.
#[test]
fn tcp_graceful_close_releases_everything() -> Result<()> {
    let mut engine: Engine = Engine::new(Instant::now(), LinkConfig::default(), 11);
    let server: TcpPeer = engine.add_peer(BOB_IPV4, test_helpers::test_tcp_config());
    let client: TcpPeer = engine.add_peer(ALICE_IPV4, test_helpers::test_tcp_config());
    let listen_qd: QDesc = listen(&server, PORT_BASE + 3, 1)?;
    let (server_qd, client_qd): (QDesc, QDesc) = connect(&mut engine, &server, listen_qd, &client, PORT_BASE + 3)?;

    client.write(client_qd, &payload(3000, 0x44))?;
    client.close(client_qd)?;
    assert!(engine.run_until(Duration::from_secs(5), |_| client.socket_count() == 0));

    let mut sink: Transfer = Transfer::new(&server, server_qd, Vec::new());
    assert!(engine.run_until(Duration::from_secs(5), |_| {
        sink.pump().expect("server should read");
        server.is_closed(server_qd)
    }));
    assert_eq!(sink.received, 3000);

    server.close(server_qd)?;
    server.close(listen_qd)?;
    assert_eq!(server.socket_count(), 0);
    assert_eq!(server.connection_count(), 0);
    assert_eq!(client.connection_count(), 0);
    Ok(())
}
