// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// CUBIC window growth on top of classic slow start, following the pseudocode of the CUBIC paper (Ha, Rhee,
// Xu) rather than RFC 8312: windows are kept in segments, `beta` is the multiplicative *decrease* factor, and window
// increments are spread over `cnt` acknowledgments.

use super::{
    CongestionControl,
    FastRetransmitRecovery,
    Options,
    SlowStartCongestionAvoidance,
};
use ::std::time::{
    Duration,
    Instant,
};

#[derive(Debug)]
pub struct Cubic {
    // Tunables.
    beta: f64,              // Multiplicative decrease factor applied on loss.
    c: f64,                 // Scaling constant of the cubic function.
    fast_convergence: bool, // Release bandwidth faster when the window stops reaching its old maximum.
    tcp_friendliness: bool, // Never grow slower than standard additive increase would.

    // Slow Start / Congestion Avoidance State.
    cwnd: f64,
    ssthresh: f64,
    w_last_max: f64,                 // Window just before the last loss event.
    epoch_start: Option<Instant>,    // Start of the current growth epoch. Cleared on loss.
    origin_point: f64,               // Plateau of the cubic function.
    k: f64,                          // Time (seconds) the cubic function takes to reach `origin_point`.
    d_min: Option<Duration>,         // Minimum RTT seen on the connection.
    w_tcp: f64,                      // Shadow window of an equivalent additive-increase flow.
    ack_cnt: f64,                    // ACKs folded into `w_tcp` since its last update.
    cnt: f64,                        // ACKs required before cwnd grows by one segment.
    cwnd_cnt: f64,                   // ACKs seen since cwnd last grew.
}

impl CongestionControl for Cubic {
    fn new(initial_cwnd: f64, initial_ssthresh: f64, options: Option<Options>) -> Box<dyn CongestionControl> {
        Box::new(Self::with_options(initial_cwnd, initial_ssthresh, options.unwrap_or_default()))
    }
}

impl Cubic {
    const DEFAULT_BETA: f64 = 0.2;
    const DEFAULT_C: f64 = 0.4;

    pub fn with_options(initial_cwnd: f64, initial_ssthresh: f64, options: Options) -> Self {
        let beta: f64 = options.get_float("beta").unwrap_or(Self::DEFAULT_BETA);
        let c: f64 = options.get_float("c").unwrap_or(Self::DEFAULT_C);
        assert!(beta > 0.0 && beta < 1.0);
        assert!(c > 0.0);
        Self {
            beta,
            c,
            fast_convergence: options.get_bool("fast_convergence").unwrap_or(true),
            tcp_friendliness: options.get_bool("tcp_friendliness").unwrap_or(true),
            cwnd: initial_cwnd.max(1.0),
            ssthresh: initial_ssthresh,
            w_last_max: 0.0,
            epoch_start: None,
            origin_point: 0.0,
            k: 0.0,
            d_min: None,
            w_tcp: 0.0,
            ack_cnt: 0.0,
            cnt: 0.0,
            cwnd_cnt: 0.0,
        }
    }

    pub fn get_w_last_max(&self) -> f64 {
        self.w_last_max
    }

    fn in_slow_start(&self) -> bool {
        self.cwnd <= self.ssthresh
    }

    // Recomputes `cnt` from the cubic target window.
    fn cubic_update(&mut self, now: Instant) {
        self.ack_cnt += 1.0;
        let epoch_start: Instant = match self.epoch_start {
            Some(epoch_start) => epoch_start,
            None => {
                self.epoch_start = Some(now);
                if self.cwnd < self.w_last_max {
                    self.k = ((self.w_last_max - self.cwnd) / self.c).cbrt();
                    self.origin_point = self.w_last_max;
                } else {
                    self.k = 0.0;
                    self.origin_point = self.cwnd;
                }
                self.ack_cnt = 1.0;
                self.w_tcp = self.cwnd;
                now
            },
        };

        let d_min: f64 = self.d_min.map(|d| d.as_secs_f64()).unwrap_or(0.0);
        let t: f64 = now.duration_since(epoch_start).as_secs_f64() + d_min;
        let target: f64 = self.origin_point + self.c * (t - self.k).powi(3);
        self.cnt = if target > self.cwnd {
            self.cwnd / (target - self.cwnd)
        } else {
            // Plateau: grow very slowly.
            100.0 * self.cwnd
        };

        if self.tcp_friendliness {
            self.cubic_tcp_friendliness();
        }
    }

    fn cubic_tcp_friendliness(&mut self) {
        self.w_tcp += 3.0 * self.beta / (2.0 - self.beta) * self.ack_cnt / self.cwnd;
        self.ack_cnt = 0.0;
        if self.w_tcp > self.cwnd {
            let max_cnt: f64 = self.cwnd / (self.w_tcp - self.cwnd);
            if self.cnt > max_cnt {
                self.cnt = max_cnt;
            }
        }
    }

    fn on_loss(&mut self) {
        self.epoch_start = None;
        if self.fast_convergence && self.cwnd < self.w_last_max {
            self.w_last_max = self.cwnd * (2.0 - self.beta) / 2.0;
        } else {
            self.w_last_max = self.cwnd;
        }
        self.cwnd = (self.cwnd * (1.0 - self.beta)).max(1.0);
        self.ssthresh = self.cwnd;
        self.cwnd_cnt = 0.0;
    }

    // Forgets the growth epoch entirely. `w_last_max` and `d_min` survive.
    fn cubic_reset(&mut self) {
        self.epoch_start = None;
        self.origin_point = 0.0;
        self.k = 0.0;
        self.w_tcp = 0.0;
        self.ack_cnt = 0.0;
        self.cnt = 0.0;
    }
}

impl SlowStartCongestionAvoidance for Cubic {
    fn get_cwnd(&self) -> f64 {
        self.cwnd
    }

    fn get_ssthresh(&self) -> f64 {
        self.ssthresh
    }

    fn on_ack_received(&mut self, now: Instant, min_rtt: Option<Duration>) {
        if min_rtt.is_some() {
            self.d_min = min_rtt;
        }

        if self.in_slow_start() {
            self.cwnd += 1.0;
            return;
        }

        self.cubic_update(now);
        if self.cwnd_cnt > self.cnt {
            self.cwnd += 1.0;
            self.cwnd_cnt = 0.0;
        } else {
            self.cwnd_cnt += 1.0;
        }
    }

    fn on_rto(&mut self, _now: Instant) {
        self.on_loss();
        self.cubic_reset();
    }
}

impl FastRetransmitRecovery for Cubic {
    fn on_fast_retransmit(&mut self, _now: Instant) {
        self.on_loss();
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::Cubic;
    use crate::inetstack::protocols::tcp::congestion_control::{
        FastRetransmitRecovery,
        Options,
        SlowStartCongestionAvoidance,
    };
    use ::anyhow::Result;
    use ::std::time::{
        Duration,
        Instant,
    };

    #[test]
    fn slow_start_adds_one_segment_per_ack() -> Result<()> {
        let now: Instant = Instant::now();
        let mut cubic: Cubic = Cubic::with_options(1.0, 8.0, Options::default());
        for expected in 2..=9 {
            cubic.on_ack_received(now, None);
            assert_eq!(cubic.get_cwnd(), expected as f64);
        }
        Ok(())
    }

    #[test]
    fn loss_reduces_window_and_sets_threshold() -> Result<()> {
        let now: Instant = Instant::now();
        let mut cubic: Cubic = Cubic::with_options(20.0, 64.0, Options::default());
        let before: f64 = cubic.get_cwnd();
        cubic.on_fast_retransmit(now);
        assert!(cubic.get_cwnd() <= before);
        assert!((cubic.get_cwnd() - 16.0).abs() < 1e-9);
        assert_eq!(cubic.get_ssthresh(), cubic.get_cwnd());
        assert_eq!(cubic.get_w_last_max(), 20.0);

        // The window is still below the previous maximum, so fast convergence shrinks the remembered maximum.
        cubic.on_fast_retransmit(now);
        assert!((cubic.get_w_last_max() - 16.0 * 0.9).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn window_never_drops_below_one_segment() -> Result<()> {
        let now: Instant = Instant::now();
        let mut cubic: Cubic = Cubic::with_options(1.0, 64.0, Options::default());
        for _ in 0..32 {
            cubic.on_rto(now);
            assert!(cubic.get_cwnd() >= 1.0);
        }
        Ok(())
    }

    #[test]
    fn congestion_avoidance_grows_over_time() -> Result<()> {
        let start: Instant = Instant::now();
        let mut cubic: Cubic = Cubic::with_options(20.0, 64.0, Options::default());
        cubic.on_fast_retransmit(start);
        let reduced: f64 = cubic.get_cwnd();

        // Feed a window's worth of ACKs per simulated 10 ms round trip for a few seconds.
        let rtt: Duration = Duration::from_millis(10);
        let mut now: Instant = start;
        for _ in 0..400 {
            now += rtt;
            for _ in 0..(cubic.get_cwnd() as usize) {
                cubic.on_ack_received(now, Some(rtt));
            }
        }
        assert!(cubic.get_cwnd() > reduced);
        // Growth past the old maximum is allowed, but it must have been reached along the way.
        assert!(cubic.get_cwnd() >= 20.0);
        Ok(())
    }

    #[test]
    fn ca_growth_is_paced_per_window() -> Result<()> {
        let now: Instant = Instant::now();
        let mut cubic: Cubic = Cubic::with_options(20.0, 10.0, Options::default());
        // Without any elapsed time cwnd is at the plateau, so a handful of ACKs must not grow the window per ACK.
        for _ in 0..5 {
            cubic.on_ack_received(now, Some(Duration::from_millis(1)));
        }
        assert!(cubic.get_cwnd() < 25.0);
        Ok(())
    }

    #[test]
    fn parameters_come_from_options() -> Result<()> {
        let now: Instant = Instant::now();
        let mut options: Options = Options::default();
        options.insert_float("beta", 0.5);
        options.insert_bool("fast_convergence", false);
        let mut cubic: Cubic = Cubic::with_options(10.0, 64.0, options);
        cubic.on_fast_retransmit(now);
        assert!((cubic.get_cwnd() - 5.0).abs() < 1e-9);
        cubic.on_fast_retransmit(now);
        // No fast convergence: the maximum is the plain pre-loss window.
        assert!((cubic.get_w_last_max() - 5.0).abs() < 1e-9);
        Ok(())
    }
}
