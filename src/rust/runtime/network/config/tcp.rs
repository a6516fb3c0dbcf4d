// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::{
    inetstack::protocols::tcp::congestion_control::{
        self,
        CongestionControl,
        CongestionControlConstructor,
        Options,
    },
    runtime::network::consts::{
        DEFAULT_BUFFER_SEGMENTS,
        DEFAULT_MSS,
        MAX_MSS,
        MIN_MSS,
        TCP_HANDSHAKE_RETRIES,
        TCP_HANDSHAKE_TIMEOUT,
        TCP_IDLE_TIMEOUT,
        TCP_INITIAL_CWND,
        TCP_INITIAL_RTO,
        TCP_INITIAL_SSTHRESH,
        TCP_ISN_RANGE,
        TCP_MAX_RTO,
        TCP_MIN_RTO,
    },
};
use ::std::time::Duration;

//==============================================================================
// Structures
//==============================================================================

/// TCP Configuration Descriptor
#[derive(Clone, Debug)]
pub struct TcpConfig {
    /// Maximum Segment Size
    mss: usize,
    /// Capacity of the Receive Buffer (bytes)
    receive_buffer_size: usize,
    /// Capacity of the Send Buffer (bytes)
    send_buffer_size: usize,
    /// Timeout for TCP Handshake Algorithm
    handshake_timeout: Duration,
    /// Number of Retries for TCP Handshake Algorithm
    handshake_retries: usize,
    /// Retransmission Timeout Before the First RTT Sample
    initial_rto: Duration,
    /// Lower Bound of the Retransmission Timeout
    min_rto: Duration,
    /// Upper Bound of the Retransmission Timeout
    max_rto: Duration,
    /// Inactivity Period After Which a Connection is Reclaimed
    idle_timeout: Duration,
    /// Upper Bound for Initial Sequence Numbers
    isn_range: u32,
    /// Initial Congestion Window (segments)
    initial_cwnd: f64,
    /// Initial Slow Start Threshold (segments)
    initial_ssthresh: f64,
    /// Congestion Control Algorithm
    congestion_ctrl_type: CongestionControlConstructor,
    /// Parameters for the Congestion Control Algorithm
    congestion_ctrl_options: Option<Options>,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate Functions for TCP Configuration Descriptor
impl TcpConfig {
    /// Gets the maximum segment size in the target [TcpConfig].
    pub fn get_mss(&self) -> usize {
        self.mss
    }

    /// Gets the receive buffer capacity in the target [TcpConfig].
    pub fn get_receive_buffer_size(&self) -> usize {
        self.receive_buffer_size
    }

    /// Gets the send buffer capacity in the target [TcpConfig].
    pub fn get_send_buffer_size(&self) -> usize {
        self.send_buffer_size
    }

    /// Gets the handshake TCP timeout in the target [TcpConfig].
    pub fn get_handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Gets the number of TCP handshake retries in the target [TcpConfig].
    pub fn get_handshake_retries(&self) -> usize {
        self.handshake_retries
    }

    pub fn get_initial_rto(&self) -> Duration {
        self.initial_rto
    }

    pub fn get_min_rto(&self) -> Duration {
        self.min_rto
    }

    pub fn get_max_rto(&self) -> Duration {
        self.max_rto
    }

    /// Gets the idle timeout in the target [TcpConfig].
    pub fn get_idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn get_isn_range(&self) -> u32 {
        self.isn_range
    }

    pub fn get_initial_cwnd(&self) -> f64 {
        self.initial_cwnd
    }

    pub fn get_initial_ssthresh(&self) -> f64 {
        self.initial_ssthresh
    }

    pub fn get_congestion_ctrl_type(&self) -> CongestionControlConstructor {
        self.congestion_ctrl_type
    }

    pub fn get_congestion_ctrl_options(&self) -> Option<Options> {
        self.congestion_ctrl_options.clone()
    }

    /// Builds a congestion controller as described by the target [TcpConfig].
    pub fn new_congestion_control(&self) -> Box<dyn CongestionControl> {
        (self.congestion_ctrl_type)(
            self.initial_cwnd,
            self.initial_ssthresh,
            self.congestion_ctrl_options.clone(),
        )
    }

    /// Sets the maximum segment size in the target [TcpConfig].
    pub fn set_mss(mut self, value: usize) -> Self {
        assert!(value >= MIN_MSS);
        assert!(value <= MAX_MSS);
        self.mss = value;
        self
    }

    /// Sets the receive buffer capacity in the target [TcpConfig].
    pub fn set_receive_buffer_size(mut self, value: usize) -> Self {
        assert!(value > 0);
        assert!(value <= u32::MAX as usize);
        self.receive_buffer_size = value;
        self
    }

    /// Sets the send buffer capacity in the target [TcpConfig].
    pub fn set_send_buffer_size(mut self, value: usize) -> Self {
        assert!(value > 0);
        self.send_buffer_size = value;
        self
    }

    /// Sets the handshake TCP timeout in the target [TcpConfig].
    pub fn set_handshake_timeout(mut self, value: Duration) -> Self {
        assert!(value > Duration::ZERO);
        self.handshake_timeout = value;
        self
    }

    /// Sets the number of TCP handshake retries in the target [TcpConfig].
    pub fn set_handshake_retries(mut self, value: usize) -> Self {
        self.handshake_retries = value;
        self
    }

    pub fn set_initial_rto(mut self, value: Duration) -> Self {
        assert!(value > Duration::ZERO);
        self.initial_rto = value;
        self
    }

    /// Sets both bounds of the retransmission timeout in the target [TcpConfig]. The upper bound must be below the
    /// idle timeout.
    pub fn set_rto_bounds(mut self, min: Duration, max: Duration) -> Self {
        assert!(min > Duration::ZERO);
        assert!(min <= max);
        assert!(max < self.idle_timeout);
        self.min_rto = min;
        self.max_rto = max;
        self
    }

    /// Sets the idle timeout in the target [TcpConfig]. It must exceed the upper bound of the retransmission timeout.
    pub fn set_idle_timeout(mut self, value: Duration) -> Self {
        assert!(value > self.max_rto);
        self.idle_timeout = value;
        self
    }

    pub fn set_isn_range(mut self, value: u32) -> Self {
        assert!(value > 0);
        self.isn_range = value;
        self
    }

    pub fn set_initial_cwnd(mut self, value: f64) -> Self {
        assert!(value >= 1.0);
        self.initial_cwnd = value;
        self
    }

    pub fn set_initial_ssthresh(mut self, value: f64) -> Self {
        assert!(value >= 1.0);
        self.initial_ssthresh = value;
        self
    }

    /// Sets the congestion control algorithm and its parameters in the target [TcpConfig].
    pub fn set_congestion_ctrl(mut self, ctor: CongestionControlConstructor, options: Option<Options>) -> Self {
        self.congestion_ctrl_type = ctor;
        self.congestion_ctrl_options = options;
        self
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// Default Trait Implementation for TCP Configuration Descriptor
impl Default for TcpConfig {
    /// Creates a TCP Configuration Descriptor with the default values.
    fn default() -> Self {
        TcpConfig {
            mss: DEFAULT_MSS,
            receive_buffer_size: DEFAULT_BUFFER_SEGMENTS * DEFAULT_MSS,
            send_buffer_size: DEFAULT_BUFFER_SEGMENTS * DEFAULT_MSS,
            handshake_timeout: TCP_HANDSHAKE_TIMEOUT,
            handshake_retries: TCP_HANDSHAKE_RETRIES,
            initial_rto: TCP_INITIAL_RTO,
            min_rto: TCP_MIN_RTO,
            max_rto: TCP_MAX_RTO,
            idle_timeout: TCP_IDLE_TIMEOUT,
            isn_range: TCP_ISN_RANGE,
            initial_cwnd: TCP_INITIAL_CWND,
            initial_ssthresh: TCP_INITIAL_SSTHRESH,
            congestion_ctrl_type: <congestion_control::Cubic as CongestionControl>::new,
            congestion_ctrl_options: None,
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
