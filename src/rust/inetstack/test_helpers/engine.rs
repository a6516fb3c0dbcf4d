// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use super::network::{
    Datagram,
    LinkConfig,
    SimulatedNetwork,
};
use crate::{
    inetstack::protocols::tcp::{
        TcpPeer,
        TimerEvent,
    },
    runtime::{
        logging,
        network::{
            config::TcpConfig,
            NetworkRuntime,
        },
        timer::SharedTimer,
    },
};
use ::std::{
    collections::BTreeMap,
    net::Ipv4Addr,
    rc::Rc,
    time::{
        Duration,
        Instant,
    },
};

//==============================================================================
// Structures
//==============================================================================

/// Drives a set of hosts attached to one simulated network, in virtual time.
pub struct Engine {
    network: SimulatedNetwork,
    peers: BTreeMap<Ipv4Addr, TcpPeer>,
    now: Instant,
    seed: u64,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl Engine {
    pub fn new(now: Instant, link: LinkConfig, seed: u64) -> Self {
        logging::initialize();
        Self {
            network: SimulatedNetwork::new(now, link, seed),
            peers: BTreeMap::new(),
            now,
            seed,
        }
    }

    /// Attaches a host with address `addr` to the network.
    pub fn add_peer(&mut self, addr: Ipv4Addr, tcp_config: TcpConfig) -> TcpPeer {
        let rt: Rc<dyn NetworkRuntime> = Rc::new(self.network.clone());
        let clock: SharedTimer<TimerEvent> = SharedTimer::new(self.now);
        let seed: u64 = self.seed ^ u64::from(u32::from(addr));
        let peer: TcpPeer = TcpPeer::new(rt, clock, addr, tcp_config, seed);
        self.peers.insert(addr, peer.clone());
        peer
    }

    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Runs the earliest pending events, as long as they are due no later than `deadline`. Returns `false` once there
    /// is nothing left to run before `deadline`, in which case the clock stops at `deadline`.
    pub fn step(&mut self, deadline: Instant) -> bool {
        let next: Option<Instant> = self
            .peers
            .values()
            .filter_map(|peer| peer.next_expiry())
            .chain(self.network.next_delivery())
            .min();
        match next {
            Some(next) if next <= deadline => {
                self.set_time(next.max(self.now));
                true
            },
            _ => {
                self.set_time(deadline.max(self.now));
                false
            },
        }
    }

    /// Lets `duration` of virtual time pass.
    pub fn advance(&mut self, duration: Duration) {
        let deadline: Instant = self.now + duration;
        while self.step(deadline) {}
    }

    /// Runs until `condition` holds, for at most `timeout` of virtual time. Returns whether `condition` held.
    pub fn run_until<F: FnMut(&Engine) -> bool>(&mut self, timeout: Duration, mut condition: F) -> bool {
        let deadline: Instant = self.now + timeout;
        loop {
            if condition(self) {
                return true;
            }
            if !self.step(deadline) {
                return condition(self);
            }
        }
    }

    fn set_time(&mut self, now: Instant) {
        self.now = now;
        for datagram in self.network.advance_clock(now) {
            self.deliver(datagram);
        }
        for peer in self.peers.values() {
            peer.advance_clock(now);
        }
    }

    fn deliver(&self, datagram: Datagram) {
        match self.peers.get(&datagram.dst) {
            Some(peer) => {
                if let Err(e) = peer.receive(datagram.src, datagram.dst, &datagram.bytes) {
                    warn!("deliver(): {} dropped a datagram from {}: {:?}", datagram.dst, datagram.src, e);
                }
            },
            None => trace!("deliver(): no host at {}", datagram.dst),
        }
    }
}
