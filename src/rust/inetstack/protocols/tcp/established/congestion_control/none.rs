// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use super::{
    CongestionControl,
    FastRetransmitRecovery,
    Options,
    SlowStartCongestionAvoidance,
};

// Implementation of congestion control which does nothing. The window stays wherever it started.
#[derive(Debug)]
pub struct None {
    cwnd: f64,
    ssthresh: f64,
}

impl CongestionControl for None {
    fn new(initial_cwnd: f64, initial_ssthresh: f64, _options: Option<Options>) -> Box<dyn CongestionControl> {
        Box::new(Self {
            cwnd: initial_cwnd.max(1.0),
            ssthresh: initial_ssthresh,
        })
    }
}

impl SlowStartCongestionAvoidance for None {
    fn get_cwnd(&self) -> f64 {
        self.cwnd
    }

    fn get_ssthresh(&self) -> f64 {
        self.ssthresh
    }
}

impl FastRetransmitRecovery for None {}
