// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::{
    fail::Fail,
    network::NetworkRuntime,
    timer::SharedTimer,
};
use ::rand::{
    rngs::SmallRng,
    Rng,
    SeedableRng,
};
use ::std::{
    cell::RefCell,
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

/// A datagram on the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Datagram {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub bytes: Vec<u8>,
}

/// Behavior of the simulated link.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// Probability that a datagram is lost.
    loss_rate: f64,
    /// Probability that a datagram is delivered twice.
    duplicate_rate: f64,
    /// Probability that a datagram is held back by `reorder_delay`, letting later ones overtake it.
    reorder_rate: f64,
    /// One-way delay of every datagram.
    latency: Duration,
    /// Extra delay of reordered datagrams.
    reorder_delay: Duration,
}

/// Counters of what happened on the link.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LinkStats {
    pub transmitted: usize,
    pub lost: usize,
    pub filtered: usize,
    pub duplicated: usize,
    pub reordered: usize,
    pub delivered: usize,
}

/// Decides whether a datagram is dropped, on top of random losses.
pub type DropFilter = Box<dyn Fn(&Datagram) -> bool>;

struct Inner {
    config: LinkConfig,
    rng: SmallRng,
    in_flight: SharedTimer<Datagram>,
    filter: Option<DropFilter>,
    history: Option<Vec<Datagram>>,
    stats: LinkStats,
}

/// Lossy network connecting every simulated host.
///
/// Deterministic for a given seed: losses, duplicates and reordering are drawn from a seeded generator.
#[derive(Clone)]
pub struct SimulatedNetwork {
    inner: Rc<RefCell<Inner>>,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl LinkConfig {
    pub fn get_loss_rate(&self) -> f64 {
        self.loss_rate
    }

    pub fn get_latency(&self) -> Duration {
        self.latency
    }

    pub fn set_loss_rate(mut self, value: f64) -> Self {
        assert!((0.0..1.0).contains(&value));
        self.loss_rate = value;
        self
    }

    pub fn set_duplicate_rate(mut self, value: f64) -> Self {
        assert!((0.0..=1.0).contains(&value));
        self.duplicate_rate = value;
        self
    }

    pub fn set_reorder_rate(mut self, value: f64) -> Self {
        assert!((0.0..=1.0).contains(&value));
        self.reorder_rate = value;
        self
    }

    pub fn set_latency(mut self, value: Duration) -> Self {
        assert!(value > Duration::ZERO);
        self.latency = value;
        self
    }

    pub fn set_reorder_delay(mut self, value: Duration) -> Self {
        self.reorder_delay = value;
        self
    }
}

impl SimulatedNetwork {
    pub fn new(now: Instant, config: LinkConfig, seed: u64) -> Self {
        let inner: Inner = Inner {
            config,
            rng: SmallRng::seed_from_u64(seed),
            in_flight: SharedTimer::new(now),
            filter: None,
            history: None,
            stats: LinkStats::default(),
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Drops every datagram for which `filter` returns `true`.
    pub fn set_filter(&self, filter: Option<DropFilter>) {
        self.inner.borrow_mut().filter = filter;
    }

    pub fn set_config(&self, config: LinkConfig) {
        self.inner.borrow_mut().config = config;
    }

    /// Starts keeping a copy of every transmitted datagram, including the ones that get lost.
    pub fn record(&self) {
        self.inner.borrow_mut().history.get_or_insert_with(Vec::new);
    }

    pub fn take_history(&self) -> Vec<Datagram> {
        match self.inner.borrow_mut().history {
            Some(ref mut history) => ::std::mem::take(history),
            None => Vec::new(),
        }
    }

    pub fn stats(&self) -> LinkStats {
        self.inner.borrow().stats
    }

    /// Moves the clock forward and returns every datagram that arrived meanwhile, in arrival order.
    pub fn advance_clock(&self, now: Instant) -> Vec<Datagram> {
        let mut inner = self.inner.borrow_mut();
        let arrived: Vec<Datagram> = inner.in_flight.advance_clock(now);
        inner.stats.delivered += arrived.len();
        arrived
    }

    pub fn next_delivery(&self) -> Option<Instant> {
        self.inner.borrow().in_flight.next_expiry()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.borrow().in_flight.pending()
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            latency: Duration::from_millis(5),
            reorder_delay: Duration::from_millis(10),
        }
    }
}

impl NetworkRuntime for SimulatedNetwork {
    fn transmit(&self, src: Ipv4Addr, dst: Ipv4Addr, bytes: Vec<u8>) -> Result<(), Fail> {
        if dst.is_unspecified() || dst.is_broadcast() || src.is_unspecified() {
            return Err(Fail::new(libc::EINVAL, "invalid datagram address"));
        }

        let mut inner = self.inner.borrow_mut();
        let datagram: Datagram = Datagram { src, dst, bytes };
        inner.stats.transmitted += 1;
        if let Some(ref mut history) = inner.history {
            history.push(datagram.clone());
        }

        if inner.filter.as_ref().map_or(false, |filter| filter(&datagram)) {
            inner.stats.filtered += 1;
            return Ok(());
        }
        let loss_rate: f64 = inner.config.loss_rate;
        if inner.rng.gen_bool(loss_rate) {
            inner.stats.lost += 1;
            return Ok(());
        }

        let mut delay: Duration = inner.config.latency;
        let reorder_rate: f64 = inner.config.reorder_rate;
        if inner.rng.gen_bool(reorder_rate) {
            inner.stats.reordered += 1;
            delay += inner.config.reorder_delay;
        }
        let duplicate_rate: f64 = inner.config.duplicate_rate;
        if inner.rng.gen_bool(duplicate_rate) {
            inner.stats.duplicated += 1;
            let latency: Duration = inner.config.latency;
            inner.in_flight.schedule(latency, datagram.clone());
        }
        inner.in_flight.schedule(delay, datagram);
        Ok(())
    }
}
