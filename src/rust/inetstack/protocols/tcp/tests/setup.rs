// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use super::{
    carries,
    connection_setup,
    decode,
    sent_by,
};
use crate::{
    inetstack::{
        protocols::tcp::{
            segment::{
                SegmentKind,
                TcpHeader,
                TcpSegment,
            },
            SeqNumber,
            State,
            TcpPeer,
        },
        test_helpers::{
            self,
            Datagram,
            Engine,
            LinkConfig,
        },
    },
    runtime::{
        network::config::TcpConfig,
        QDesc,
    },
};
use ::anyhow::Result;
use ::libc::{
    EADDRINUSE,
    EAGAIN,
    EBADF,
    EDESTADDRREQ,
    EINVAL,
    ENOTCONN,
};
use ::std::{
    cell::Cell,
    net::SocketAddrV4,
    rc::Rc,
    time::{
        Duration,
        Instant,
    },
};

//=============================================================================

fn new_engine() -> Engine {
    Engine::new(Instant::now(), LinkConfig::default(), 1)
}

//=============================================================================

/// Tests connection establishment.
#[test]
fn test_connection_setup() -> Result<()> {
    let mut engine: Engine = new_engine();
    let server: TcpPeer = engine.add_peer(test_helpers::BOB_IPV4, test_helpers::test_tcp_config());
    let client: TcpPeer = engine.add_peer(test_helpers::ALICE_IPV4, test_helpers::test_tcp_config());
    engine.network().record();

    let (listen_qd, server_qd, client_qd): (QDesc, QDesc, QDesc) = connection_setup(&mut engine, &server, &client, 80)?;

    assert_eq!(server.state(listen_qd)?, State::Listen);
    assert_eq!(server.pending_connections(listen_qd)?, 0);

    // Both ends agree on the endpoints.
    let (client_local, client_remote) = client.endpoints(client_qd)?;
    let (server_local, server_remote) = server.endpoints(server_qd)?;
    assert_eq!(client_local, server_remote);
    assert_eq!(client_remote, server_local);
    assert_eq!(server_local, Some(SocketAddrV4::new(test_helpers::BOB_IPV4, 80)));

    // One SYN, acknowledged with its sequence number plus one and the full receive window.
    let history: Vec<Datagram> = engine.network().take_history();
    let syns: Vec<TcpSegment> = sent_by(&history, test_helpers::ALICE_IPV4, SegmentKind::Syn);
    let acks: Vec<TcpSegment> = sent_by(&history, test_helpers::BOB_IPV4, SegmentKind::Ack);
    assert_eq!(syns.len(), 1);
    assert_eq!(acks.len(), 1);
    let isn: SeqNumber = syns[0].header.seq_num;
    assert!((1..=1000).contains(&u32::from(isn)));
    assert_eq!(acks[0].header.seq_num, isn + 1);
    assert_eq!(acks[0].header.window, 16_000);

    // Both directions of the stream start right after the SYN.
    let client_stats = client.stats(client_qd)?.expect("connected socket has statistics");
    let server_stats = server.stats(server_qd)?.expect("connected socket has statistics");
    assert_eq!(client_stats.send_next, u32::from(isn + 1));
    assert_eq!(client_stats.recv_next, u32::from(isn + 1));
    assert_eq!(server_stats.send_unacked, u32::from(isn + 1));
    assert_eq!(server_stats.recv_next, u32::from(isn + 1));
    assert_eq!(client_stats.peer_window, 16_000);
    assert_eq!(client.connection_count(), 1);
    assert_eq!(server.connection_count(), 1);
    Ok(())
}

/// Tests that an unanswered handshake is eventually abandoned.
#[test]
fn test_connection_timeout() -> Result<()> {
    let mut engine: Engine = new_engine();
    let config: TcpConfig = test_helpers::test_tcp_config().set_handshake_retries(3);
    let client: TcpPeer = engine.add_peer(test_helpers::ALICE_IPV4, config.clone());
    engine.network().record();

    // Nobody lives at Carrie's address.
    let client_qd: QDesc = client.socket()?;
    client.connect(client_qd, SocketAddrV4::new(test_helpers::CARRIE_IPV4, 80))?;

    let timeout: Duration = config.get_handshake_timeout();
    engine.advance(timeout * 3 + timeout / 2);
    assert!(client.is_connection_pending(client_qd));
    engine.advance(timeout);
    assert!(client.is_closed(client_qd));
    assert_eq!(client.connection_count(), 0);

    let history: Vec<Datagram> = engine.network().take_history();
    let syns: Vec<TcpSegment> = sent_by(&history, test_helpers::ALICE_IPV4, SegmentKind::Syn);
    assert_eq!(syns.len(), 4);
    // Every resend carries the same initial sequence number.
    assert!(syns.iter().all(|syn| syn.header.seq_num == syns[0].header.seq_num));
    Ok(())
}

/// Tests that connecting to a port nobody listens on is refused.
#[test]
fn test_refuse_connection_without_listener() -> Result<()> {
    let mut engine: Engine = new_engine();
    let _server: TcpPeer = engine.add_peer(test_helpers::BOB_IPV4, test_helpers::test_tcp_config());
    let client: TcpPeer = engine.add_peer(test_helpers::ALICE_IPV4, test_helpers::test_tcp_config());
    engine.network().record();

    let client_qd: QDesc = client.socket()?;
    client.connect(client_qd, SocketAddrV4::new(test_helpers::BOB_IPV4, 80))?;
    assert!(engine.run_until(Duration::from_millis(50), |_| client.is_closed(client_qd)));

    let history: Vec<Datagram> = engine.network().take_history();
    let fins: Vec<TcpSegment> = sent_by(&history, test_helpers::BOB_IPV4, SegmentKind::Fin);
    assert_eq!(fins.len(), 1);
    // Closed sockets keep their descriptor until the application lets go.
    assert_eq!(client.state(client_qd)?, State::Closed);
    client.close(client_qd)?;
    assert_eq!(client.socket_count(), 0);
    Ok(())
}

/// Tests that a listener with a full backlog refuses new connections.
#[test]
fn test_refuse_connection_backlog_full() -> Result<()> {
    let mut engine: Engine = new_engine();
    let server: TcpPeer = engine.add_peer(test_helpers::BOB_IPV4, test_helpers::test_tcp_config());
    let alice: TcpPeer = engine.add_peer(test_helpers::ALICE_IPV4, test_helpers::test_tcp_config());
    let carrie: TcpPeer = engine.add_peer(test_helpers::CARRIE_IPV4, test_helpers::test_tcp_config());
    engine.network().record();
    let listen_addr: SocketAddrV4 = SocketAddrV4::new(test_helpers::BOB_IPV4, 80);

    let listen_qd: QDesc = server.socket()?;
    server.bind(listen_qd, 80)?;
    server.listen(listen_qd, 1)?;
    assert_eq!(server.accept(listen_qd).map_err(|e| e.errno), Err(EAGAIN));

    let alice_qd: QDesc = alice.socket()?;
    alice.connect(alice_qd, listen_addr)?;
    let carrie_qd: QDesc = carrie.socket()?;
    carrie.connect(carrie_qd, listen_addr)?;

    engine.advance(Duration::from_millis(50));
    assert!(alice.is_connected(alice_qd));
    assert!(carrie.is_closed(carrie_qd));
    assert_eq!(server.pending_connections(listen_qd)?, 1);

    let history: Vec<Datagram> = engine.network().take_history();
    assert!(history
        .iter()
        .any(|datagram| carries(datagram, test_helpers::BOB_IPV4, test_helpers::CARRIE_IPV4, SegmentKind::Fin)));
    assert!(!history
        .iter()
        .any(|datagram| carries(datagram, test_helpers::BOB_IPV4, test_helpers::ALICE_IPV4, SegmentKind::Fin)));

    let server_qd: QDesc = server.accept(listen_qd)?;
    assert_eq!(server.endpoints(server_qd)?.1, alice.endpoints(alice_qd)?.0);
    assert_eq!(server.accept(listen_qd).map_err(|e| e.errno), Err(EAGAIN));

    // The backlog has room again.
    let carrie_qd: QDesc = carrie.socket()?;
    carrie.connect(carrie_qd, listen_addr)?;
    assert!(engine.run_until(Duration::from_millis(50), |_| carrie.is_connected(carrie_qd)));
    Ok(())
}

/// Tests that a lost handshake ACK is recovered without spawning a second connection.
#[test]
fn test_repeated_syn_is_acknowledged_again() -> Result<()> {
    let mut engine: Engine = new_engine();
    let server: TcpPeer = engine.add_peer(test_helpers::BOB_IPV4, test_helpers::test_tcp_config());
    let client: TcpPeer = engine.add_peer(test_helpers::ALICE_IPV4, test_helpers::test_tcp_config());
    engine.network().record();

    // Lose the first ACK from the server.
    let dropped: Rc<Cell<usize>> = Rc::new(Cell::new(0));
    let counter: Rc<Cell<usize>> = dropped.clone();
    engine.network().set_filter(Some(Box::new(move |datagram: &Datagram| {
        let drop: bool =
            counter.get() == 0 && carries(datagram, test_helpers::BOB_IPV4, test_helpers::ALICE_IPV4, SegmentKind::Ack);
        if drop {
            counter.set(1);
        }
        drop
    })));

    let listen_qd: QDesc = server.socket()?;
    server.bind(listen_qd, 80)?;
    server.listen(listen_qd, 4)?;
    let client_qd: QDesc = client.socket()?;
    client.connect(client_qd, SocketAddrV4::new(test_helpers::BOB_IPV4, 80))?;

    assert!(engine.run_until(Duration::from_secs(1), |_| client.is_connected(client_qd)));
    assert_eq!(dropped.get(), 1);
    assert_eq!(server.pending_connections(listen_qd)?, 1);

    let history: Vec<Datagram> = engine.network().take_history();
    assert_eq!(sent_by(&history, test_helpers::ALICE_IPV4, SegmentKind::Syn).len(), 2);
    let acks: Vec<TcpSegment> = sent_by(&history, test_helpers::BOB_IPV4, SegmentKind::Ack);
    assert_eq!(acks.len(), 2);
    assert_eq!(acks[0].header.seq_num, acks[1].header.seq_num);

    // Once accepted, a late SYN reaches the connection itself.
    let server_qd: QDesc = server.accept(listen_qd)?;
    let (client_local, _) = client.endpoints(client_qd)?;
    let client_local: SocketAddrV4 = client_local.expect("connected socket is bound");
    let server_local: SocketAddrV4 = SocketAddrV4::new(test_helpers::BOB_IPV4, 80);
    assert!(server.is_address_in_use(server_local, client_local));
    let syn: TcpSegment = TcpSegment::control(
        client_local.port(),
        80,
        SegmentKind::Syn,
        SeqNumber::from(u32::from(acks[0].header.seq_num) - 1),
        16_000,
    );
    server.receive(test_helpers::ALICE_IPV4, test_helpers::BOB_IPV4, &syn.serialize())?;
    assert!(server.is_connected(server_qd));
    assert_eq!(server.connection_count(), 1);
    assert_eq!(server.accept(listen_qd).map_err(|e| e.errno), Err(EAGAIN));
    Ok(())
}

/// Injects a SYN from Alice's end of the connection and returns what Bob answered with.
fn answer_to_syn(engine: &Engine, server: &TcpPeer, client_local: SocketAddrV4) -> Result<Vec<Datagram>> {
    engine.network().record();
    let syn: TcpSegment =
        TcpSegment::control(client_local.port(), 80, SegmentKind::Syn, SeqNumber::from(77), 16_000);
    server.receive(test_helpers::ALICE_IPV4, test_helpers::BOB_IPV4, &syn.serialize())?;
    Ok(engine.network().take_history())
}

/// Tests that a SYN reaching a connection that is shutting down is refused.
#[test]
fn test_syn_refused_while_shutting_down() -> Result<()> {
    // The server got the client's FIN but has unread data.
    let mut engine: Engine = new_engine();
    let server: TcpPeer = engine.add_peer(test_helpers::BOB_IPV4, test_helpers::test_tcp_config());
    let client: TcpPeer = engine.add_peer(test_helpers::ALICE_IPV4, test_helpers::test_tcp_config());
    let (_, server_qd, client_qd): (QDesc, QDesc, QDesc) = connection_setup(&mut engine, &server, &client, 80)?;
    let client_local: SocketAddrV4 = client.endpoints(client_qd)?.0.expect("connected socket is bound");

    client.write(client_qd, &[1; 500])?;
    engine.advance(Duration::from_millis(50));
    client.close(client_qd)?;
    engine.advance(Duration::from_millis(50));
    assert_eq!(server.state(server_qd)?, State::Shutdown);

    let answer: Vec<Datagram> = answer_to_syn(&engine, &server, client_local)?;
    assert_eq!(answer.len(), 1);
    assert!(carries(&answer[0], test_helpers::BOB_IPV4, test_helpers::ALICE_IPV4, SegmentKind::Fin));
    let fin: TcpSegment = decode(&answer[0]);
    assert_eq!(fin.header.seq_num, SeqNumber::from(77));
    assert_eq!(fin.header.dst_port, client_local.port());
    assert_eq!(server.state(server_qd)?, State::Shutdown);

    // The server closed with data still unacknowledged.
    let mut engine: Engine = new_engine();
    let server: TcpPeer = engine.add_peer(test_helpers::BOB_IPV4, test_helpers::test_tcp_config());
    let client: TcpPeer = engine.add_peer(test_helpers::ALICE_IPV4, test_helpers::test_tcp_config());
    let (_, server_qd, client_qd): (QDesc, QDesc, QDesc) = connection_setup(&mut engine, &server, &client, 80)?;
    let client_local: SocketAddrV4 = client.endpoints(client_qd)?.0.expect("connected socket is bound");

    engine.network().set_filter(Some(Box::new(|datagram: &Datagram| {
        carries(datagram, test_helpers::ALICE_IPV4, test_helpers::BOB_IPV4, SegmentKind::Ack)
    })));
    server.write(server_qd, &[2; 500])?;
    engine.advance(Duration::from_millis(10));
    server.close(server_qd)?;
    assert_eq!(server.state(server_qd)?, State::Shutdown);

    let answer: Vec<Datagram> = answer_to_syn(&engine, &server, client_local)?;
    assert_eq!(answer.len(), 1);
    assert!(carries(&answer[0], test_helpers::BOB_IPV4, test_helpers::ALICE_IPV4, SegmentKind::Fin));
    assert_eq!(decode(&answer[0]).header.seq_num, SeqNumber::from(77));
    assert_eq!(server.state(server_qd)?, State::Shutdown);
    Ok(())
}

/// Tests that an ACK with the wrong sequence number does not complete the handshake.
#[test]
fn test_spoofed_ack_is_ignored() -> Result<()> {
    let mut engine: Engine = new_engine();
    let client: TcpPeer = engine.add_peer(test_helpers::ALICE_IPV4, test_helpers::test_tcp_config());
    engine.network().record();

    let client_qd: QDesc = client.socket()?;
    client.connect(client_qd, SocketAddrV4::new(test_helpers::CARRIE_IPV4, 80))?;
    let history: Vec<Datagram> = engine.network().take_history();
    let syn: TcpSegment = decode(&history[0]);
    let local_port: u16 = syn.header.src_port;

    for offset in 2..200 {
        let spoof: TcpSegment =
            TcpSegment::control(80, local_port, SegmentKind::Ack, syn.header.seq_num + offset, 16_000);
        client.receive(test_helpers::CARRIE_IPV4, test_helpers::ALICE_IPV4, &spoof.serialize())?;
    }
    assert!(client.is_connection_pending(client_qd));
    // Nothing is sent back.
    assert!(engine.network().take_history().is_empty());

    let ack: TcpSegment = TcpSegment::control(80, local_port, SegmentKind::Ack, syn.header.seq_num + 1, 4_000);
    client.receive(test_helpers::CARRIE_IPV4, test_helpers::ALICE_IPV4, &ack.serialize())?;
    assert!(client.is_connected(client_qd));
    assert_eq!(client.stats(client_qd)?.map(|stats| stats.peer_window), Some(4_000));
    Ok(())
}

/// Tests that segments nobody expects are refused, except FINs.
#[test]
fn test_unexpected_segments() -> Result<()> {
    let mut engine: Engine = new_engine();
    let server: TcpPeer = engine.add_peer(test_helpers::BOB_IPV4, test_helpers::test_tcp_config());
    engine.network().record();

    let data: TcpSegment = TcpSegment::new(
        TcpHeader::new(5000, 80, SegmentKind::Data, SeqNumber::from(10)),
        vec![1, 2, 3],
    );
    server.receive(test_helpers::ALICE_IPV4, test_helpers::BOB_IPV4, &data.serialize())?;
    let fin: TcpSegment = TcpSegment::control(5000, 80, SegmentKind::Fin, SeqNumber::from(10), 0);
    server.receive(test_helpers::ALICE_IPV4, test_helpers::BOB_IPV4, &fin.serialize())?;

    let history: Vec<Datagram> = engine.network().take_history();
    assert_eq!(history.len(), 1);
    let refusal: TcpSegment = decode(&history[0]);
    assert_eq!(refusal.header.kind, SegmentKind::Fin);
    assert_eq!((refusal.header.src_port, refusal.header.dst_port), (80, 5000));
    assert_eq!(history[0].dst, test_helpers::ALICE_IPV4);

    // Garbage is reported to the delivery layer.
    assert!(server
        .receive(test_helpers::ALICE_IPV4, test_helpers::BOB_IPV4, &[1, 2, 3])
        .is_err());
    // So are datagrams for somebody else.
    assert!(server
        .receive(test_helpers::ALICE_IPV4, test_helpers::CARRIE_IPV4, &fin.serialize())
        .is_err());
    Ok(())
}

/// Tests the errors of the socket calls.
#[test]
fn test_socket_call_errors() -> Result<()> {
    let mut engine: Engine = new_engine();
    let peer: TcpPeer = engine.add_peer(test_helpers::BOB_IPV4, test_helpers::test_tcp_config());
    let buf: [u8; 8] = [0; 8];
    let mut out: [u8; 8] = [0; 8];

    let qd: QDesc = peer.socket()?;
    assert!(peer.is_closed(qd));
    assert_eq!(peer.listen(qd, 1).map_err(|e| e.errno), Err(EDESTADDRREQ));
    assert_eq!(peer.accept(qd).map_err(|e| e.errno), Err(EINVAL));
    assert_eq!(peer.read(qd, &mut out).map_err(|e| e.errno), Err(ENOTCONN));
    assert_eq!(peer.write(qd, &buf).map_err(|e| e.errno), Err(ENOTCONN));

    peer.bind(qd, 8080)?;
    assert_eq!(peer.bind(qd, 8081).map_err(|e| e.errno), Err(EINVAL));
    assert_eq!(peer.listen(qd, 0).map_err(|e| e.errno), Err(EINVAL));

    let other_qd: QDesc = peer.socket()?;
    assert_eq!(peer.bind(other_qd, 8080).map_err(|e| e.errno), Err(EADDRINUSE));

    peer.listen(qd, 1)?;
    assert_eq!(peer.listen(qd, 1).map_err(|e| e.errno), Err(EINVAL));
    assert!(peer.connect(qd, SocketAddrV4::new(test_helpers::ALICE_IPV4, 80)).is_err());

    peer.close(qd)?;
    assert_eq!(peer.close(qd).map_err(|e| e.errno), Err(EBADF));
    assert_eq!(peer.read(qd, &mut out).map_err(|e| e.errno), Err(EBADF));
    assert!(peer.is_closed(qd));

    // The port is free again.
    peer.bind(other_qd, 8080)?;
    peer.release(other_qd)?;
    assert_eq!(peer.socket_count(), 0);
    Ok(())
}

/// Tests that closing a listener closes the connections it did not hand out yet.
#[test]
fn test_close_listener_with_pending_connection() -> Result<()> {
    let mut engine: Engine = new_engine();
    let server: TcpPeer = engine.add_peer(test_helpers::BOB_IPV4, test_helpers::test_tcp_config());
    let client: TcpPeer = engine.add_peer(test_helpers::ALICE_IPV4, test_helpers::test_tcp_config());

    let listen_qd: QDesc = server.socket()?;
    server.bind(listen_qd, 80)?;
    server.listen(listen_qd, 1)?;
    let client_qd: QDesc = client.socket()?;
    client.connect(client_qd, SocketAddrV4::new(test_helpers::BOB_IPV4, 80))?;
    assert!(engine.run_until(Duration::from_millis(50), |_| client.is_connected(client_qd)));

    server.close(listen_qd)?;
    assert!(engine.run_until(Duration::from_millis(50), |_| client.is_closed(client_qd)));
    assert_eq!(server.socket_count(), 0);
    assert_eq!(server.connection_count(), 0);
    Ok(())
}
