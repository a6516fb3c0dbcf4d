// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod setup;

use crate::{
    inetstack::{
        protocols::tcp::{
            segment::{
                SegmentKind,
                TcpSegment,
            },
            TcpPeer,
        },
        test_helpers::{
            Datagram,
            Engine,
        },
    },
    runtime::QDesc,
};
use ::anyhow::Result;
use ::std::{
    net::{
        Ipv4Addr,
        SocketAddrV4,
    },
    time::Duration,
};

//=============================================================================

/// Builds a buffer of `size` bytes, either all equal to `stamp` or counting up.
pub fn cook_buffer(size: usize, stamp: Option<u8>) -> Vec<u8> {
    match stamp {
        Some(stamp) => vec![stamp; size],
        None => (0..size).map(|i| (i % 251) as u8).collect(),
    }
}

/// Parses the segment carried by `datagram`.
pub fn decode(datagram: &Datagram) -> TcpSegment {
    TcpSegment::parse(&datagram.bytes).expect("datagram should carry a valid segment")
}

/// Whether `datagram` goes from `src` to `dst` and carries a segment of the given kind.
pub fn carries(datagram: &Datagram, src: Ipv4Addr, dst: Ipv4Addr, kind: SegmentKind) -> bool {
    datagram.src == src
        && datagram.dst == dst
        && TcpSegment::parse(&datagram.bytes).map_or(false, |segment| segment.header.kind == kind)
}

/// Segments of the given kind that `src` sent, in transmission order.
pub fn sent_by(history: &[Datagram], src: Ipv4Addr, kind: SegmentKind) -> Vec<TcpSegment> {
    history
        .iter()
        .filter(|datagram| datagram.src == src)
        .map(decode)
        .filter(|segment| segment.header.kind == kind)
        .collect()
}

//=============================================================================

/// Opens a listening socket on `server` and connects `client` to it. Returns the listening socket, the accepted
/// socket and the client socket.
pub fn connection_setup(
    engine: &mut Engine,
    server: &TcpPeer,
    client: &TcpPeer,
    listen_port: u16,
) -> Result<(QDesc, QDesc, QDesc)> {
    let listen_addr: SocketAddrV4 = SocketAddrV4::new(server.local_ipv4_addr(), listen_port);

    let listen_qd: QDesc = server.socket()?;
    server.bind(listen_qd, listen_port)?;
    server.listen(listen_qd, 8)?;

    let client_qd: QDesc = client.socket()?;
    client.connect(client_qd, listen_addr)?;
    assert!(client.is_connection_pending(client_qd));

    let connected: bool = engine.run_until(Duration::from_secs(10), |_| {
        client.is_connected(client_qd) && server.pending_connections(listen_qd).unwrap_or(0) > 0
    });
    if !connected {
        anyhow::bail!("handshake did not complete");
    }
    let server_qd: QDesc = server.accept(listen_qd)?;
    assert!(server.is_connected(server_qd));

    Ok((listen_qd, server_qd, client_qd))
}

/// Reads whatever is available on `qd` into `out`.
pub fn drain(peer: &TcpPeer, qd: QDesc, out: &mut Vec<u8>) -> Result<usize> {
    let mut buf: [u8; 4096] = [0; 4096];
    let mut total: usize = 0;
    loop {
        let n: usize = peer.read(qd, &mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        out.extend_from_slice(&buf[..n]);
        total += n;
    }
}
