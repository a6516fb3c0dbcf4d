// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod cubic;
mod none;
mod options;

use ::std::{
    fmt::Debug,
    time::{
        Duration,
        Instant,
    },
};

pub use self::{
    cubic::Cubic,
    none::None,
    options::{
        OptionValue,
        Options,
    },
};

// Windows are counted in segments, not bytes, and may be fractional.
pub trait SlowStartCongestionAvoidance {
    fn get_cwnd(&self) -> f64;

    fn get_ssthresh(&self) -> f64;

    // Called once for every segment that a new acknowledgment covers. `min_rtt` is the smallest RTT observed on the
    // connection so far.
    fn on_ack_received(&mut self, _now: Instant, _min_rtt: Option<Duration>) {}

    // Called immediately before retransmit after RTO.
    fn on_rto(&mut self, _now: Instant) {}
}

pub trait FastRetransmitRecovery
where
    Self: SlowStartCongestionAvoidance,
{
    // Called immediately before a retransmission triggered by duplicate acknowledgments.
    fn on_fast_retransmit(&mut self, _now: Instant) {}
}

pub trait CongestionControl: SlowStartCongestionAvoidance + FastRetransmitRecovery + Debug {
    fn new(initial_cwnd: f64, initial_ssthresh: f64, options: Option<Options>) -> Box<dyn CongestionControl>
    where
        Self: Sized;
}

pub type CongestionControlConstructor = fn(f64, f64, Option<Options>) -> Box<dyn CongestionControl>;

/// Looks up a congestion control algorithm by its configuration name.
pub fn constructor_by_name(name: &str) -> Option<CongestionControlConstructor> {
    match name {
        "cubic" => Some(<Cubic as CongestionControl>::new as CongestionControlConstructor),
        "none" => Some(<None as CongestionControl>::new as CongestionControlConstructor),
        _ => Option::None,
    }
}
