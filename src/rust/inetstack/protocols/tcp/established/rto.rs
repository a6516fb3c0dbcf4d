// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use ::std::time::Duration;

// TCP Retransmission Timeout (RTO) Calculator.
// See RFC 6298 for details.

#[derive(Debug)]
pub struct RtoCalculator {
    // Smoothed round-trip time.
    srtt: f64,

    // Round-trip time deviation.
    rttdev: f64,

    // Retransmission timeout.
    rto: f64,

    // Smallest round-trip time observed so far.
    min_rtt: Option<Duration>,

    // Whether a RTT (round-trip-time) sample has been received yet.
    received_sample: bool,

    // Bounds for the retransmission timeout, in seconds.
    lower_bound: f64,
    upper_bound: f64,
}

impl RtoCalculator {
    /// Initializes an RTO Calculator.
    pub fn new(initial_rto: Duration, min_rto: Duration, max_rto: Duration) -> Self {
        assert!(min_rto <= max_rto);
        let lower_bound: f64 = min_rto.as_secs_f64();
        let upper_bound: f64 = max_rto.as_secs_f64();
        Self {
            srtt: 0.0,
            rttdev: 0.0,
            rto: initial_rto.as_secs_f64().clamp(lower_bound, upper_bound),
            min_rtt: None,
            received_sample: false,
            lower_bound,
            upper_bound,
        }
    }

    /// Adds an RTT sample to the calculator.
    pub fn add_sample(&mut self, rtt: Duration) {
        // Gain for the smoothed RTT.
        const ALPHA: f64 = 0.125;
        // Gain for the RTT deviation.
        const BETA: f64 = 0.25;

        self.min_rtt = Some(match self.min_rtt {
            Some(min_rtt) => min_rtt.min(rtt),
            None => rtt,
        });

        let rtt: f64 = rtt.as_secs_f64();
        if !self.received_sample {
            // The first sample seeds both estimators directly.
            self.srtt = rtt;
            self.rttdev = rtt;
            self.received_sample = true;
        } else {
            self.rttdev = (1.0 - BETA) * self.rttdev + BETA * (rtt - self.srtt).abs();
            self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt;
        }

        let rto: f64 = self.srtt + 4.0 * self.rttdev;
        self.update_rto(rto);
    }

    /// Updates the stored RTO value while keeping it within the configured bounds.
    fn update_rto(&mut self, new_rto: f64) {
        self.rto = new_rto.clamp(self.lower_bound, self.upper_bound);
    }

    /// Performs an exponential "back off" of the RTO (doubles the current timeout).
    pub fn back_off(&mut self) {
        self.update_rto(self.rto * 2.0);
    }

    /// Gets the current RTO value.
    pub fn rto(&self) -> Duration {
        Duration::from_secs_f64(self.rto)
    }

    /// Gets the smoothed round-trip time, if any sample has been taken.
    pub fn srtt(&self) -> Option<Duration> {
        if self.received_sample {
            Some(Duration::from_secs_f64(self.srtt))
        } else {
            None
        }
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        self.min_rtt
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
