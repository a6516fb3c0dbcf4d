// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    inetstack::protocols::tcp::{
        active_open::ActiveOpenSocket,
        established::{
            AckOutcome,
            ControlBlock,
            DataSegment,
        },
        passive_open::PassiveSocket,
        segment::{
            SegmentKind,
            TcpHeader,
            TcpSegment,
        },
        stats::ConnectionStats,
        SeqNumber,
    },
    runtime::{
        fail::Fail,
        network::{
            config::TcpConfig,
            NetworkRuntime,
        },
        timer::SharedTimer,
    },
};
use ::std::{
    cell::Cell,
    fmt,
    mem,
    net::SocketAddrV4,
    rc::Rc,
    time::{
        Duration,
        Instant,
    },
};

//======================================================================================================================
// Enumerations
//======================================================================================================================

/// Externally visible connection state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Closed,
    Listen,
    SynSent,
    Established,
    Shutdown,
}

/// What a timer event asks its socket to do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimerKind {
    /// The SYN went unanswered.
    ResendSyn,
    /// Data up to `watermark` may need to be sent again. Only the latest `schedule` is live.
    ResendData { watermark: SeqNumber, schedule: u64 },
    /// Reclaim the connection if nothing was received for too long.
    IdleCheck,
}

enum SocketState {
    Unbound,
    Bound,
    Listening(PassiveSocket),
    Connecting(ActiveOpenSocket),
    Established(ControlBlock),
    // Closed by the application, still flushing the send buffer before the FIN goes out.
    Closing(ControlBlock),
    // Closed by the peer, holding received bytes until the application reads them.
    Draining(ControlBlock),
    Closed,
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Timer event addressed to one socket.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimerEvent {
    pub socket_id: u64,
    pub kind: TimerKind,
}

/// Hands out socket identifiers that are never reused, so that timers outliving their socket can be told apart.
#[derive(Clone, Default)]
pub struct SocketIdAllocator(Rc<Cell<u64>>);

/// Connection entity: one per socket, including listening sockets and the connections they spawn.
pub struct TcpSocket {
    id: u64,
    state: SocketState,
    local: Option<SocketAddrV4>,
    // Kept after the connection ends, so that the socket table can still find the entry to remove.
    remote: Option<SocketAddrV4>,
    runtime: Rc<dyn NetworkRuntime>,
    clock: SharedTimer<TimerEvent>,
    tcp_config: TcpConfig,
    ids: SocketIdAllocator,
    last_receive: Instant,
    idle_check_armed: bool,
    retransmit_schedule: u64,
    // Last view of the control block, kept once the connection is gone.
    final_stats: Option<ConnectionStats>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl SocketIdAllocator {
    pub fn next(&self) -> u64 {
        let id: u64 = self.0.get();
        self.0.set(id + 1);
        id
    }
}

impl TcpSocket {
    pub fn new(
        runtime: Rc<dyn NetworkRuntime>,
        clock: SharedTimer<TimerEvent>,
        tcp_config: TcpConfig,
        ids: SocketIdAllocator,
    ) -> Self {
        let last_receive: Instant = clock.now();
        Self {
            id: ids.next(),
            state: SocketState::Unbound,
            local: None,
            remote: None,
            runtime,
            clock,
            tcp_config,
            ids,
            last_receive,
            idle_check_armed: false,
            retransmit_schedule: 0,
            final_stats: None,
        }
    }

    /// Creates the server side of a connection whose SYN just arrived on a listening socket.
    fn new_established(&self, remote: SocketAddrV4, cb: ControlBlock) -> Self {
        let mut socket: TcpSocket = Self::new(
            self.runtime.clone(),
            self.clock.clone(),
            self.tcp_config.clone(),
            self.ids.clone(),
        );
        socket.local = self.local;
        socket.remote = Some(remote);
        socket.state = SocketState::Established(cb);
        socket
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn local(&self) -> Option<SocketAddrV4> {
        self.local
    }

    pub fn remote(&self) -> Option<SocketAddrV4> {
        self.remote
    }

    pub fn state(&self) -> State {
        match self.state {
            SocketState::Unbound | SocketState::Bound | SocketState::Closed => State::Closed,
            SocketState::Listening(_) => State::Listen,
            SocketState::Connecting(_) => State::SynSent,
            SocketState::Established(_) => State::Established,
            SocketState::Closing(_) | SocketState::Draining(_) => State::Shutdown,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == State::Closed
    }

    pub fn is_listening(&self) -> bool {
        self.state() == State::Listen
    }

    pub fn is_connected(&self) -> bool {
        self.state() == State::Established
    }

    pub fn is_connection_pending(&self) -> bool {
        self.state() == State::SynSent
    }

    pub fn is_closure_pending(&self) -> bool {
        self.state() == State::Shutdown
    }

    /// Whether the socket went through its whole life and can be dropped from the socket table.
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, SocketState::Closed)
    }

    /// Connections waiting to be accepted, for a listening socket.
    pub fn pending_connections(&self) -> usize {
        match self.state {
            SocketState::Listening(ref passive) => passive.len(),
            _ => 0,
        }
    }

    pub fn stats(&self) -> Option<ConnectionStats> {
        match self.control_block() {
            Some(cb) => Some(ConnectionStats::from(cb)),
            None => self.final_stats.clone(),
        }
    }

    fn control_block(&self) -> Option<&ControlBlock> {
        match self.state {
            SocketState::Established(ref cb) | SocketState::Closing(ref cb) | SocketState::Draining(ref cb) => Some(cb),
            _ => None,
        }
    }

    //==================================================================================================================
    // Application Calls
    //==================================================================================================================

    /// Binds the target socket to `local` address.
    pub fn bind(&mut self, local: SocketAddrV4) -> Result<(), Fail> {
        match self.state {
            SocketState::Unbound => {
                self.local = Some(local);
                self.state = SocketState::Bound;
                Ok(())
            },
            _ => Err(Fail::new(libc::EINVAL, "socket is already bound")),
        }
    }

    /// Sets the target socket to listen for incoming connections.
    pub fn listen(&mut self, backlog: usize) -> Result<(), Fail> {
        if backlog == 0 {
            return Err(Fail::new(libc::EINVAL, "invalid backlog length"));
        }
        match self.state {
            SocketState::Bound => {
                self.state = SocketState::Listening(PassiveSocket::new(backlog));
                Ok(())
            },
            SocketState::Unbound => Err(Fail::new(libc::EDESTADDRREQ, "socket is not bound")),
            _ => Err(Fail::new(libc::EINVAL, "socket cannot listen in its current state")),
        }
    }

    /// Takes the oldest connection that completed the handshake.
    pub fn accept(&mut self) -> Result<TcpSocket, Fail> {
        match self.state {
            SocketState::Listening(ref mut passive) => passive
                .pop()
                .ok_or(Fail::new(libc::EAGAIN, "no pending connection")),
            _ => Err(Fail::new(libc::EINVAL, "socket is not listening")),
        }
    }

    /// Starts the handshake with `remote` using `local_isn` as initial sequence number.
    pub fn connect(&mut self, remote: SocketAddrV4, local_isn: SeqNumber) -> Result<(), Fail> {
        match self.state {
            SocketState::Bound => (),
            SocketState::Unbound => return Err(Fail::new(libc::EDESTADDRREQ, "socket is not bound")),
            SocketState::Connecting(_) => return Err(Fail::new(libc::EALREADY, "connection already in progress")),
            SocketState::Listening(_) => return Err(Fail::new(libc::EOPNOTSUPP, "socket is listening")),
            _ => return Err(Fail::new(libc::EISCONN, "socket was already connected")),
        }

        let active: ActiveOpenSocket = ActiveOpenSocket::new(remote, local_isn);
        self.remote = Some(remote);
        self.send_syn(&active);
        self.state = SocketState::Connecting(active);
        Ok(())
    }

    /// Moves received bytes into `buf`. Returns zero when nothing is available, or at the end of a closed stream.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Fail> {
        match mem::replace(&mut self.state, SocketState::Closed) {
            SocketState::Established(mut cb) => {
                let n: usize = self.consume(&mut cb, buf, true);
                self.state = SocketState::Established(cb);
                Ok(n)
            },
            SocketState::Closing(mut cb) => {
                let n: usize = self.consume(&mut cb, buf, true);
                self.state = SocketState::Closing(cb);
                Ok(n)
            },
            SocketState::Draining(mut cb) => {
                let n: usize = self.consume(&mut cb, buf, false);
                self.state = if cb.receiver.has_unread() {
                    SocketState::Draining(cb)
                } else {
                    debug!("read(): stream from {:?} fully read", self.remote);
                    self.reclaim(Some(&cb))
                };
                Ok(n)
            },
            SocketState::Closed if self.remote.is_some() => Ok(0),
            state => {
                self.state = state;
                Err(Fail::new(libc::ENOTCONN, "socket is not connected"))
            },
        }
    }

    /// Copies as much of `buf` as the send buffer takes and sends what the windows allow.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Fail> {
        match mem::replace(&mut self.state, SocketState::Closed) {
            SocketState::Established(mut cb) => {
                let n: usize = cb.sender.write(buf);
                trace!("write(): {} of {} bytes buffered", n, buf.len());
                self.send_data(&mut cb);
                self.state = SocketState::Established(cb);
                Ok(n)
            },
            state => {
                self.state = state;
                Err(Fail::new(libc::ENOTCONN, "socket is not connected"))
            },
        }
    }

    /// Graceful close. The FIN waits for every written byte to be acknowledged.
    pub fn close(&mut self) {
        self.state = match mem::replace(&mut self.state, SocketState::Closed) {
            SocketState::Listening(mut passive) => {
                for mut child in passive.drain() {
                    child.close();
                }
                SocketState::Closed
            },
            SocketState::Established(cb) => {
                if cb.sender.is_flushed() {
                    self.send_fin(&cb);
                    self.reclaim(Some(&cb))
                } else {
                    let unacked: usize = cb.sender.buffer().unsent() + cb.sender.buffer().unacknowledged();
                    debug!("close(): {} bytes not acknowledged yet, deferring FIN", unacked);
                    SocketState::Closing(cb)
                }
            },
            SocketState::Closing(cb) => SocketState::Closing(cb),
            SocketState::Draining(cb) => self.reclaim(Some(&cb)),
            _ => SocketState::Closed,
        };
    }

    /// Abortive close. Nothing is sent to the peer.
    pub fn release(&mut self) {
        let state: SocketState = mem::replace(&mut self.state, SocketState::Closed);
        if let SocketState::Established(ref cb) | SocketState::Closing(ref cb) | SocketState::Draining(ref cb) = state {
            self.final_stats = Some(ConnectionStats::from(cb));
        }
    }

    //==================================================================================================================
    // Inbound Segments
    //==================================================================================================================

    /// Processes a segment that `remote` sent to this socket.
    pub fn receive(&mut self, remote: SocketAddrV4, segment: TcpSegment) {
        trace!("receive(): {:?} from {}", segment, remote);
        self.state = match mem::replace(&mut self.state, SocketState::Closed) {
            SocketState::Listening(mut passive) => {
                self.listening_receive(&mut passive, remote, segment);
                SocketState::Listening(passive)
            },
            SocketState::Connecting(active) => self.connecting_receive(active, segment),
            SocketState::Established(cb) => self.established_receive(cb, segment),
            SocketState::Closing(cb) => self.closing_receive(cb, segment),
            SocketState::Draining(cb) => self.draining_receive(cb, segment),
            state @ (SocketState::Unbound | SocketState::Bound | SocketState::Closed) => {
                if segment.header.kind != SegmentKind::Fin {
                    debug!("receive(): unexpected {:?} on an unconnected socket", segment.header.kind);
                    self.refuse(remote, &segment);
                }
                state
            },
        };
    }

    fn listening_receive(&mut self, passive: &mut PassiveSocket, remote: SocketAddrV4, segment: TcpSegment) {
        // Connections waiting to be accepted are reached through their listener.
        if let Some(child) = passive.get_mut(&remote) {
            child.receive(remote, segment);
            passive.reap();
            return;
        }

        match segment.header.kind {
            SegmentKind::Syn if passive.is_full() => {
                warn!("listening_receive(): backlog full, refusing {}", remote);
                self.refuse(remote, &segment);
            },
            SegmentKind::Syn => {
                let seq_no: SeqNumber = segment.header.seq_num + 1;
                let cb: ControlBlock = ControlBlock::new(seq_no, segment.header.window, &self.tcp_config);
                let mut child: TcpSocket = self.new_established(remote, cb);
                debug!("listening_receive(): new connection from {} (seq {})", remote, seq_no);
                child.send_ack();
                child.touch();
                passive.push(child);
            },
            SegmentKind::Fin => trace!("listening_receive(): ignoring FIN from {}", remote),
            kind => {
                warn!("listening_receive(): unexpected {:?} from {}", kind, remote);
                self.refuse(remote, &segment);
            },
        }
    }

    fn connecting_receive(&mut self, active: ActiveOpenSocket, segment: TcpSegment) -> SocketState {
        match segment.header.kind {
            SegmentKind::Ack if segment.header.seq_num == active.expected_ack() => {
                info!("connecting_receive(): connection to {} established", active.get_remote());
                let cb: ControlBlock =
                    ControlBlock::new(active.expected_ack(), segment.header.window, &self.tcp_config);
                self.touch();
                SocketState::Established(cb)
            },
            SegmentKind::Ack => {
                debug!(
                    "connecting_receive(): ignoring ACK {} (expected {})",
                    segment.header.seq_num,
                    active.expected_ack()
                );
                SocketState::Connecting(active)
            },
            SegmentKind::Fin => {
                info!("connecting_receive(): connection refused by {}", active.get_remote());
                self.reclaim(None)
            },
            SegmentKind::Syn => {
                self.refuse(active.get_remote(), &segment);
                SocketState::Connecting(active)
            },
            SegmentKind::Data => {
                trace!("connecting_receive(): data before the handshake completed");
                SocketState::Connecting(active)
            },
        }
    }

    fn established_receive(&mut self, mut cb: ControlBlock, segment: TcpSegment) -> SocketState {
        self.touch();
        match segment.header.kind {
            SegmentKind::Syn => self.send_ack_for(&cb),
            SegmentKind::Ack => self.process_ack(&mut cb, &segment),
            SegmentKind::Data => self.process_data(&mut cb, &segment),
            SegmentKind::Fin if cb.receiver.has_unread() => {
                debug!("established_receive(): FIN with unread data");
                return SocketState::Draining(cb);
            },
            SegmentKind::Fin => {
                debug!("established_receive(): FIN from {:?}", self.remote);
                return self.reclaim(Some(&cb));
            },
        }
        SocketState::Established(cb)
    }

    fn closing_receive(&mut self, mut cb: ControlBlock, segment: TcpSegment) -> SocketState {
        self.touch();
        match segment.header.kind {
            SegmentKind::Syn => self.refuse_syn(&segment),
            SegmentKind::Ack => {
                self.process_ack(&mut cb, &segment);
                if cb.sender.is_flushed() {
                    debug!("closing_receive(): send buffer flushed, sending FIN");
                    self.send_fin(&cb);
                    return self.reclaim(Some(&cb));
                }
            },
            SegmentKind::Data => self.process_data(&mut cb, &segment),
            SegmentKind::Fin => return self.reclaim(Some(&cb)),
        }
        SocketState::Closing(cb)
    }

    fn draining_receive(&mut self, mut cb: ControlBlock, segment: TcpSegment) -> SocketState {
        self.touch();
        match segment.header.kind {
            SegmentKind::Syn => self.refuse_syn(&segment),
            SegmentKind::Ack => self.process_ack(&mut cb, &segment),
            // Nothing follows a FIN.
            SegmentKind::Data | SegmentKind::Fin => (),
        }
        SocketState::Draining(cb)
    }

    fn process_ack(&mut self, cb: &mut ControlBlock, segment: &TcpSegment) {
        let now: Instant = self.clock.now();
        match cb.sender.on_ack(segment.header.seq_num, segment.header.window, now) {
            AckOutcome::Advanced | AckOutcome::Duplicate(None) => self.send_data(cb),
            AckOutcome::Duplicate(Some(data)) => {
                let window: u32 = cb.receiver.window();
                self.send_data_segment(data, window);
            },
            AckOutcome::Ignored => (),
        }
    }

    /// Takes in-order data and acknowledges. Anything else gets a duplicate ACK with the unchanged window.
    fn process_data(&mut self, cb: &mut ControlBlock, segment: &TcpSegment) {
        if !cb.receiver.on_data(segment.header.seq_num, &segment.payload) {
            trace!("process_data(): sending duplicate ACK for {}", cb.receiver.recv_next());
        }
        self.send_ack_for(cb);
    }

    fn consume(&mut self, cb: &mut ControlBlock, buf: &mut [u8], announce_window: bool) -> usize {
        let was_closed: bool = cb.receiver.window() == 0;
        let n: usize = cb.receiver.read(buf);
        // Tell the peer that the window reopened.
        if announce_window && was_closed && n > 0 {
            self.send_ack_for(cb);
        }
        n
    }

    //==================================================================================================================
    // Timers
    //==================================================================================================================

    /// Handles a timer event addressed to this socket.
    pub fn on_timer(&mut self, kind: TimerKind) {
        self.state = match mem::replace(&mut self.state, SocketState::Closed) {
            SocketState::Connecting(mut active) => match kind {
                TimerKind::ResendSyn => {
                    if active.retry(self.tcp_config.get_handshake_retries()) {
                        debug!("on_timer(): resending SYN to {} (retry {})", active.get_remote(), active.retries());
                        self.send_syn(&active);
                        SocketState::Connecting(active)
                    } else {
                        warn!("on_timer(): handshake with {} timed out", active.get_remote());
                        self.reclaim(None)
                    }
                },
                _ => SocketState::Connecting(active),
            },
            SocketState::Established(mut cb) => {
                if self.synchronized_timer(&mut cb, kind) {
                    SocketState::Established(cb)
                } else {
                    self.reclaim(Some(&cb))
                }
            },
            SocketState::Closing(mut cb) => {
                if self.synchronized_timer(&mut cb, kind) {
                    SocketState::Closing(cb)
                } else {
                    self.reclaim(Some(&cb))
                }
            },
            SocketState::Draining(mut cb) => {
                if self.synchronized_timer(&mut cb, kind) {
                    SocketState::Draining(cb)
                } else {
                    self.reclaim(Some(&cb))
                }
            },
            state => {
                trace!("on_timer(): {:?} no longer applies", kind);
                state
            },
        };
    }

    /// Routes a timer event to a connection that waits to be accepted. Returns `false` if there is none with that id.
    pub fn on_pending_timer(&mut self, socket_id: u64, kind: TimerKind) -> bool {
        match self.state {
            SocketState::Listening(ref mut passive) => match passive.get_by_id_mut(socket_id) {
                Some(child) => {
                    child.on_timer(kind);
                    passive.reap();
                    true
                },
                None => false,
            },
            _ => false,
        }
    }

    // Returns `false` if the connection must be reclaimed.
    fn synchronized_timer(&mut self, cb: &mut ControlBlock, kind: TimerKind) -> bool {
        match kind {
            TimerKind::ResendData { watermark, schedule } => {
                if schedule != self.retransmit_schedule {
                    trace!("on_timer(): stale retransmission schedule {}", schedule);
                    return true;
                }
                let now: Instant = self.clock.now();
                if let Some(segments) = cb.sender.on_retransmit_timeout(watermark, now) {
                    debug!(
                        "on_timer(): retransmitting {} segments from {} (rto={:?})",
                        segments.len(),
                        cb.sender.send_unacked(),
                        cb.rto()
                    );
                    let window: u32 = cb.receiver.window();
                    for data in segments {
                        self.send_data_segment(data, window);
                    }
                    self.arm_retransmit(cb.sender.send_next(), cb.rto());
                }
                true
            },
            TimerKind::IdleCheck => {
                let idle: Duration = self.clock.now().saturating_duration_since(self.last_receive);
                let timeout: Duration = self.tcp_config.get_idle_timeout();
                if idle >= timeout {
                    info!("on_timer(): connection with {:?} idle for {:?}, reclaiming", self.remote, idle);
                    return false;
                }
                self.clock.schedule(timeout - idle, self.timer_event(TimerKind::IdleCheck));
                true
            },
            TimerKind::ResendSyn => true,
        }
    }

    fn arm_retransmit(&mut self, watermark: SeqNumber, rto: Duration) {
        self.retransmit_schedule += 1;
        let kind: TimerKind = TimerKind::ResendData {
            watermark,
            schedule: self.retransmit_schedule,
        };
        self.clock.schedule(rto, self.timer_event(kind));
    }

    /// Records activity and makes sure an idle check is pending.
    fn touch(&mut self) {
        self.last_receive = self.clock.now();
        if !self.idle_check_armed {
            self.idle_check_armed = true;
            self.clock
                .schedule(self.tcp_config.get_idle_timeout(), self.timer_event(TimerKind::IdleCheck));
        }
    }

    fn timer_event(&self, kind: TimerKind) -> TimerEvent {
        TimerEvent {
            socket_id: self.id,
            kind,
        }
    }

    fn reclaim(&mut self, cb: Option<&ControlBlock>) -> SocketState {
        if let Some(cb) = cb {
            self.final_stats = Some(ConnectionStats::from(cb));
        }
        SocketState::Closed
    }

    //==================================================================================================================
    // Outbound Segments
    //==================================================================================================================

    fn send_data(&mut self, cb: &mut ControlBlock) {
        let now: Instant = self.clock.now();
        let segments: Vec<DataSegment> = cb.sender.segments_to_send(now);
        if segments.is_empty() {
            return;
        }
        let window: u32 = cb.receiver.window();
        for data in segments {
            self.send_data_segment(data, window);
        }
        self.arm_retransmit(cb.sender.send_next(), cb.rto());
    }

    fn send_syn(&self, active: &ActiveOpenSocket) {
        let window: u32 = self.tcp_config.get_receive_buffer_size() as u32;
        let local_port: u16 = self.local.map_or(0, |local| local.port());
        self.transmit(active.get_remote(), active.syn_segment(local_port, window));
        self.clock
            .schedule(self.tcp_config.get_handshake_timeout(), self.timer_event(TimerKind::ResendSyn));
    }

    fn send_ack(&self) {
        if let SocketState::Established(ref cb) = self.state {
            self.send_ack_for(cb);
        }
    }

    fn send_ack_for(&self, cb: &ControlBlock) {
        self.send_control(SegmentKind::Ack, cb.receiver.recv_next(), cb.receiver.window());
    }

    fn send_fin(&self, cb: &ControlBlock) {
        self.send_control(SegmentKind::Fin, cb.sender.send_next(), cb.receiver.window());
    }

    fn send_control(&self, kind: SegmentKind, seq_num: SeqNumber, window: u32) {
        if let (Some(local), Some(remote)) = (self.local, self.remote) {
            self.transmit(remote, TcpSegment::control(local.port(), remote.port(), kind, seq_num, window));
        }
    }

    fn send_data_segment(&self, data: DataSegment, window: u32) {
        if let (Some(local), Some(remote)) = (self.local, self.remote) {
            let mut header: TcpHeader = TcpHeader::new(local.port(), remote.port(), SegmentKind::Data, data.seq_num);
            header.window = window;
            self.transmit(remote, TcpSegment::new(header, data.payload));
        }
    }

    /// Answers `segment` with a FIN, telling its sender that there is no connection for it here.
    /// Answers a SYN that reached a connection on its way out.
    fn refuse_syn(&self, segment: &TcpSegment) {
        if let Some(remote) = self.remote {
            debug!("refuse_syn(): connection with {} is shutting down", remote);
            self.refuse(remote, segment);
        }
    }

    fn refuse(&self, remote: SocketAddrV4, segment: &TcpSegment) {
        let local_port: u16 = self.local.map_or(segment.header.dst_port, |local| local.port());
        let fin: TcpSegment =
            TcpSegment::control(local_port, remote.port(), SegmentKind::Fin, segment.header.seq_num, 0);
        self.transmit(remote, fin);
    }

    fn transmit(&self, remote: SocketAddrV4, segment: TcpSegment) {
        let local: SocketAddrV4 = match self.local {
            Some(local) => local,
            None => {
                warn!("transmit(): socket is not bound, dropping {:?}", segment);
                return;
            },
        };
        trace!("transmit(): {:?} to {}", segment, remote);
        if let Err(e) = self.runtime.transmit(*local.ip(), *remote.ip(), segment.serialize()) {
            warn!("transmit(): could not send {:?} to {}: {:?}", segment, remote, e);
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl fmt::Debug for TcpSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpSocket")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("local", &self.local)
            .field("remote", &self.remote)
            .finish()
    }
}
