// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use super::{
    isn_generator::IsnGenerator,
    segment::{
        SegmentKind,
        TcpSegment,
    },
    socket::{
        SocketIdAllocator,
        State,
        TcpSocket,
        TimerEvent,
    },
    stats::ConnectionStats,
    SeqNumber,
};
use crate::runtime::{
    fail::Fail,
    network::{
        config::TcpConfig,
        ephemeral::EphemeralPorts,
        NetworkRuntime,
    },
    queue::IoQueueTable,
    timer::SharedTimer,
    QDesc,
};
use ::libc::{
    EADDRINUSE,
    EBADF,
    EINVAL,
};
use ::rand::{
    rngs::SmallRng,
    Rng,
    SeedableRng,
};
use ::std::{
    cell::{
        Ref,
        RefCell,
        RefMut,
    },
    collections::{
        HashMap,
        HashSet,
    },
    net::{
        Ipv4Addr,
        SocketAddrV4,
    },
    rc::Rc,
    time::Instant,
};

//==============================================================================
// Structures
//==============================================================================

pub struct Inner {
    isn_generator: IsnGenerator,

    ephemeral_ports: EphemeralPorts,

    // QDesc -> socket
    sockets: IoQueueTable<TcpSocket>,

    // Synchronized and connecting sockets, by (local, remote).
    connections: HashMap<(SocketAddrV4, SocketAddrV4), QDesc>,
    // Bound sockets, by local address. Only those without a remote end match inbound segments through this table.
    bound: HashMap<SocketAddrV4, QDesc>,
    // Socket id -> QDesc, for timer events.
    ids: HashMap<u64, QDesc>,
    // Closed by the application, kept until the connection is over.
    detached: HashSet<QDesc>,

    rt: Rc<dyn NetworkRuntime>,
    clock: SharedTimer<TimerEvent>,
    local_ipv4_addr: Ipv4Addr,
    tcp_config: TcpConfig,
    socket_ids: SocketIdAllocator,
}

/// Demultiplexer in front of every TCP socket of one IPv4 endpoint.
///
/// Each peer needs a clock of its own: timer events are addressed to sockets by an identifier that only means
/// something to the peer that scheduled them.
#[derive(Clone)]
pub struct TcpPeer {
    inner: Rc<RefCell<Inner>>,
}

//==============================================================================
// Associated Functions
//==============================================================================

impl TcpPeer {
    pub fn new(
        rt: Rc<dyn NetworkRuntime>,
        clock: SharedTimer<TimerEvent>,
        local_ipv4_addr: Ipv4Addr,
        tcp_config: TcpConfig,
        rng_seed: u64,
    ) -> Self {
        let inner: Inner = Inner::new(rt, clock, local_ipv4_addr, tcp_config, rng_seed);
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub fn local_ipv4_addr(&self) -> Ipv4Addr {
        self.inner.borrow().local_ipv4_addr
    }

    /// Opens a TCP socket.
    pub fn socket(&self) -> Result<QDesc, Fail> {
        let mut inner: RefMut<Inner> = self.inner.borrow_mut();
        let socket: TcpSocket = TcpSocket::new(
            inner.rt.clone(),
            inner.clock.clone(),
            inner.tcp_config.clone(),
            inner.socket_ids.clone(),
        );
        let id: u64 = socket.id();
        let qd: QDesc = inner.sockets.alloc(socket);
        inner.ids.insert(id, qd);
        trace!("socket(): {}", qd);
        Ok(qd)
    }

    /// Binds the target socket to `port` on the local address. Port zero picks an ephemeral port.
    pub fn bind(&self, qd: QDesc, port: u16) -> Result<(), Fail> {
        trace!("bind(): qd={} port={}", qd, port);
        self.inner.borrow_mut().bind(qd, port).map(|_| ())
    }

    /// Marks the target socket as passive.
    pub fn listen(&self, qd: QDesc, backlog: usize) -> Result<(), Fail> {
        trace!("listen(): qd={} backlog={}", qd, backlog);
        self.inner.borrow_mut().get_socket_mut(qd)?.listen(backlog)
    }

    /// Takes a connection that completed the handshake. Fails with `EAGAIN` if there is none yet.
    pub fn accept(&self, qd: QDesc) -> Result<QDesc, Fail> {
        trace!("accept(): qd={}", qd);
        self.inner.borrow_mut().accept(qd)
    }

    /// Starts connecting the target socket to `remote`. Completion shows in [TcpPeer::is_connected].
    pub fn connect(&self, qd: QDesc, remote: SocketAddrV4) -> Result<(), Fail> {
        trace!("connect(): qd={} remote={}", qd, remote);
        self.inner.borrow_mut().connect(qd, remote)
    }

    /// Reads received bytes. Never blocks: zero means nothing to read right now, or the end of the stream.
    pub fn read(&self, qd: QDesc, buf: &mut [u8]) -> Result<usize, Fail> {
        let mut inner: RefMut<Inner> = self.inner.borrow_mut();
        let result: Result<usize, Fail> = inner.get_socket_mut(qd)?.read(buf);
        inner.settle(qd);
        result
    }

    /// Buffers as much of `buf` as fits and returns how much that was.
    pub fn write(&self, qd: QDesc, buf: &[u8]) -> Result<usize, Fail> {
        self.inner.borrow_mut().get_socket_mut(qd)?.write(buf)
    }

    /// Graceful close. The descriptor is gone right away; the connection lives on until its FIN is out.
    pub fn close(&self, qd: QDesc) -> Result<(), Fail> {
        trace!("close(): qd={}", qd);
        let mut inner: RefMut<Inner> = self.inner.borrow_mut();
        inner.get_socket_mut(qd)?.close();
        inner.detached.insert(qd);
        inner.settle(qd);
        Ok(())
    }

    /// Abortive close. The socket is dropped without notifying the remote end.
    pub fn release(&self, qd: QDesc) -> Result<(), Fail> {
        trace!("release(): qd={}", qd);
        let mut inner: RefMut<Inner> = self.inner.borrow_mut();
        inner.get_socket_mut(qd)?.release();
        inner.detached.insert(qd);
        inner.settle(qd);
        Ok(())
    }

    pub fn state(&self, qd: QDesc) -> Result<State, Fail> {
        Ok(self.inner.borrow().inspect_socket(qd)?.state())
    }

    pub fn is_closed(&self, qd: QDesc) -> bool {
        self.state(qd).map_or(true, |state| state == State::Closed)
    }

    pub fn is_connected(&self, qd: QDesc) -> bool {
        self.state(qd).map_or(false, |state| state == State::Established)
    }

    pub fn is_connection_pending(&self, qd: QDesc) -> bool {
        self.state(qd).map_or(false, |state| state == State::SynSent)
    }

    pub fn is_closure_pending(&self, qd: QDesc) -> bool {
        self.state(qd).map_or(false, |state| state == State::Shutdown)
    }

    pub fn pending_connections(&self, qd: QDesc) -> Result<usize, Fail> {
        Ok(self.inner.borrow().inspect_socket(qd)?.pending_connections())
    }

    pub fn stats(&self, qd: QDesc) -> Result<Option<ConnectionStats>, Fail> {
        Ok(self.inner.borrow().inspect_socket(qd)?.stats())
    }

    pub fn endpoints(&self, qd: QDesc) -> Result<(Option<SocketAddrV4>, Option<SocketAddrV4>), Fail> {
        let inner: Ref<Inner> = self.inner.borrow();
        let socket: &TcpSocket = inner.inspect_socket(qd)?;
        Ok((socket.local(), socket.remote()))
    }

    /// Whether a connection between `local` and `remote` is registered.
    pub fn is_address_in_use(&self, local: SocketAddrV4, remote: SocketAddrV4) -> bool {
        self.inner.borrow().connections.contains_key(&(local, remote))
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.inner.borrow().connections.len()
    }

    /// Number of sockets still held, including the closed ones whose connection is not over yet.
    pub fn socket_count(&self) -> usize {
        self.inner.borrow().sockets.len()
    }

    /// Delivers a datagram that `src` sent to `dst`.
    pub fn receive(&self, src: Ipv4Addr, dst: Ipv4Addr, bytes: &[u8]) -> Result<(), Fail> {
        self.inner.borrow_mut().receive(src, dst, bytes)
    }

    /// Moves the clock forward and runs every timer that expired.
    pub fn advance_clock(&self, now: Instant) {
        self.inner.borrow_mut().advance_clock(now)
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.inner.borrow().clock.next_expiry()
    }
}

impl Inner {
    fn new(
        rt: Rc<dyn NetworkRuntime>,
        clock: SharedTimer<TimerEvent>,
        local_ipv4_addr: Ipv4Addr,
        tcp_config: TcpConfig,
        rng_seed: u64,
    ) -> Self {
        let mut rng: SmallRng = SmallRng::seed_from_u64(rng_seed);
        let ephemeral_ports: EphemeralPorts = EphemeralPorts::new(&mut rng);
        let nonce: u64 = rng.gen();
        Self {
            isn_generator: IsnGenerator::new(nonce, tcp_config.get_isn_range()),
            ephemeral_ports,
            sockets: IoQueueTable::default(),
            connections: HashMap::new(),
            bound: HashMap::new(),
            ids: HashMap::new(),
            detached: HashSet::new(),
            rt,
            clock,
            local_ipv4_addr,
            tcp_config,
            socket_ids: SocketIdAllocator::default(),
        }
    }

    /// Looks a socket up for inspection. Sockets closed by the application stay visible until they are dropped.
    fn inspect_socket(&self, qd: QDesc) -> Result<&TcpSocket, Fail> {
        self.sockets
            .get(qd)
            .ok_or(Fail::new(EBADF, "invalid queue descriptor"))
    }

    fn get_socket(&self, qd: QDesc) -> Result<&TcpSocket, Fail> {
        match self.sockets.get(qd) {
            Some(socket) if !self.detached.contains(&qd) => Ok(socket),
            _ => Err(Fail::new(EBADF, "invalid queue descriptor")),
        }
    }

    fn get_socket_mut(&mut self, qd: QDesc) -> Result<&mut TcpSocket, Fail> {
        match self.sockets.get_mut(qd) {
            Some(socket) if !self.detached.contains(&qd) => Ok(socket),
            _ => Err(Fail::new(EBADF, "invalid queue descriptor")),
        }
    }

    fn bind(&mut self, qd: QDesc, port: u16) -> Result<SocketAddrV4, Fail> {
        if self.get_socket(qd)?.local().is_some() {
            return Err(Fail::new(EINVAL, "socket is already bound to an address"));
        }

        let port: u16 = if port == 0 {
            self.ephemeral_ports.alloc()?
        } else {
            let local: SocketAddrV4 = SocketAddrV4::new(self.local_ipv4_addr, port);
            if self.bound.contains_key(&local) {
                return Err(Fail::new(EADDRINUSE, "address already in use"));
            }
            // Keep the ephemeral port allocator consistent.
            if EphemeralPorts::is_private(port) {
                self.ephemeral_ports.reserve(port)?;
            }
            port
        };

        let local: SocketAddrV4 = SocketAddrV4::new(self.local_ipv4_addr, port);
        if let Err(e) = self.get_socket_mut(qd)?.bind(local) {
            self.free_port(port);
            return Err(e);
        }
        self.bound.insert(local, qd);
        Ok(local)
    }

    fn accept(&mut self, qd: QDesc) -> Result<QDesc, Fail> {
        let mut child: TcpSocket = self.get_socket_mut(qd)?.accept()?;
        let key: (SocketAddrV4, SocketAddrV4) = match (child.local(), child.remote()) {
            (Some(local), Some(remote)) => (local, remote),
            _ => return Err(Fail::new(EINVAL, "accepted socket has no endpoints")),
        };
        if self.connections.contains_key(&key) {
            warn!("accept(): connection {:?} already registered", key);
            child.release();
            return Err(Fail::new(EADDRINUSE, "address already in use"));
        }

        let id: u64 = child.id();
        let new_qd: QDesc = self.sockets.alloc(child);
        self.connections.insert(key, new_qd);
        self.ids.insert(id, new_qd);
        debug!("accept(): {} -> {:?}", new_qd, key);
        // The connection may have ended while it was waiting.
        self.settle(new_qd);
        Ok(new_qd)
    }

    fn connect(&mut self, qd: QDesc, remote: SocketAddrV4) -> Result<(), Fail> {
        if remote.ip().is_unspecified() || remote.ip().is_broadcast() || remote.ip().is_multicast() {
            return Err(Fail::new(EINVAL, "invalid remote address"));
        }
        if self.get_socket(qd)?.state() != State::Closed {
            return Err(Fail::new(libc::EISCONN, "socket is in use"));
        }

        let local: SocketAddrV4 = match self.get_socket(qd)?.local() {
            Some(local) => local,
            None => self.bind(qd, 0)?,
        };
        if self.connections.contains_key(&(local, remote)) {
            return Err(Fail::new(EADDRINUSE, "connection already exists"));
        }

        let isn: SeqNumber = self.isn_generator.generate();
        self.get_socket_mut(qd)?.connect(remote, isn)?;
        self.connections.insert((local, remote), qd);
        debug!("connect(): {} {} -> {} (isn {})", qd, local, remote, isn);
        Ok(())
    }

    fn receive(&mut self, src: Ipv4Addr, dst: Ipv4Addr, bytes: &[u8]) -> Result<(), Fail> {
        let segment: TcpSegment = TcpSegment::parse(bytes)?;
        if dst != self.local_ipv4_addr {
            return Err(Fail::new(EINVAL, "destination address mismatch"));
        }
        if src.is_broadcast() || src.is_multicast() || src.is_unspecified() {
            return Err(Fail::new(EINVAL, "invalid address type"));
        }
        let local: SocketAddrV4 = SocketAddrV4::new(dst, segment.header.dst_port);
        let remote: SocketAddrV4 = SocketAddrV4::new(src, segment.header.src_port);

        if let Some(&qd) = self.connections.get(&(local, remote)) {
            trace!("receive(): routing {:?} to connection {}", segment, qd);
            self.dispatch(qd, remote, segment);
            return Ok(());
        }
        if let Some(&qd) = self.bound.get(&local) {
            let unconnected: bool = self.sockets.get(qd).map_or(false, |socket| socket.remote().is_none());
            if unconnected {
                trace!("receive(): routing {:?} to {}", segment, qd);
                self.dispatch(qd, remote, segment);
                return Ok(());
            }
        }

        warn!("receive(): unexpected {:?} from {} to {}", segment, remote, local);
        // Refusing a FIN would only bounce refusals back and forth.
        if segment.header.kind != SegmentKind::Fin {
            let fin: TcpSegment =
                TcpSegment::control(local.port(), remote.port(), SegmentKind::Fin, segment.header.seq_num, 0);
            if let Err(e) = self.rt.transmit(dst, src, fin.serialize()) {
                warn!("receive(): could not refuse {}: {:?}", remote, e);
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, qd: QDesc, remote: SocketAddrV4, segment: TcpSegment) {
        if let Some(socket) = self.sockets.get_mut(qd) {
            socket.receive(remote, segment);
        }
        self.settle(qd);
    }

    fn advance_clock(&mut self, now: Instant) {
        for event in self.clock.advance_clock(now) {
            match self.ids.get(&event.socket_id).copied() {
                Some(qd) => {
                    if let Some(socket) = self.sockets.get_mut(qd) {
                        socket.on_timer(event.kind);
                    }
                    self.settle(qd);
                },
                None => {
                    let delivered: bool = self
                        .sockets
                        .iter_mut()
                        .filter(|(_, socket)| socket.is_listening())
                        .any(|(_, socket)| socket.on_pending_timer(event.socket_id, event.kind));
                    if !delivered {
                        trace!("advance_clock(): dropping {:?}, socket is gone", event);
                    }
                },
            }
        }
    }

    /// Unregisters the socket behind `qd` if it reached the end of its life, and drops it if it is detached.
    fn settle(&mut self, qd: QDesc) {
        let (id, local, remote): (u64, Option<SocketAddrV4>, Option<SocketAddrV4>) = match self.sockets.get(qd) {
            Some(socket) if socket.is_terminated() => (socket.id(), socket.local(), socket.remote()),
            _ => return,
        };

        if let (Some(local), Some(remote)) = (local, remote) {
            if self.connections.get(&(local, remote)) == Some(&qd) {
                debug!("settle(): unregistering {:?}", (local, remote));
                self.connections.remove(&(local, remote));
            }
        }
        if let Some(local) = local {
            if self.bound.get(&local) == Some(&qd) {
                self.bound.remove(&local);
                self.free_port(local.port());
            }
        }
        self.ids.remove(&id);

        if self.detached.remove(&qd) {
            trace!("settle(): freeing {}", qd);
            self.sockets.free(qd);
        }
    }

    fn free_port(&mut self, port: u16) {
        if EphemeralPorts::is_private(port) {
            if let Err(e) = self.ephemeral_ports.free(port) {
                warn!("free_port(): {:?}", e);
            }
        }
    }
}
