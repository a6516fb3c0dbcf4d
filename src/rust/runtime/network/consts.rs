// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::time::Duration;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Minimum MSS Parameter for TCP
pub const MIN_MSS: usize = 1;

/// Maximum MSS Parameter for TCP
pub const MAX_MSS: usize = u16::MAX as usize;

/// Default MSS Parameter for TCP
pub const DEFAULT_MSS: usize = 1000;

/// Default size of the send and receive buffers, in segments.
pub const DEFAULT_BUFFER_SEGMENTS: usize = 32;

/// Handshake timeout for tcp. An unanswered SYN is resent after this long.
pub const TCP_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Number of SYN resends before a connection attempt is abandoned.
pub const TCP_HANDSHAKE_RETRIES: usize = 16;

/// Retransmission timeout used until the first RTT sample arrives.
pub const TCP_INITIAL_RTO: Duration = Duration::from_secs(1);

/// Lower bound for the retransmission timeout.
pub const TCP_MIN_RTO: Duration = Duration::from_millis(10);

/// Upper bound for the retransmission timeout. Must stay below [TCP_IDLE_TIMEOUT].
pub const TCP_MAX_RTO: Duration = Duration::from_secs(10);

/// A connection that has not received anything for this long is released.
pub const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Initial sequence numbers are drawn from `[1, TCP_ISN_RANGE]`.
pub const TCP_ISN_RANGE: u32 = 1000;

/// Initial congestion window, in segments.
pub const TCP_INITIAL_CWND: f64 = 2.0;

/// Initial slow start threshold, in segments.
pub const TCP_INITIAL_SSTHRESH: f64 = 64.0;
