// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::inetstack::protocols::tcp::established::ControlBlock;
use ::std::time::Duration;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Point-in-time view of a connection's transmission control block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionStats {
    /// Segments sent again, by timeout or fast retransmit.
    pub retransmissions: usize,
    pub fast_retransmits: usize,
    /// Congestion window (segments).
    pub cwnd: f64,
    pub srtt: Option<Duration>,
    pub rto: Duration,
    /// Segments sent and not acknowledged yet.
    pub in_flight: usize,
    pub peer_window: u32,
    pub send_unacked: u32,
    pub send_next: u32,
    pub recv_next: u32,

    // Send buffer pointers.
    pub write_app_ptr: u64,
    pub send_ptr: u64,
    pub safe_ack_ptr: u64,
    pub send_capacity: usize,

    // Receive buffer pointers.
    pub read_ptr: u64,
    pub write_ptr: u64,
    pub receive_capacity: usize,
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<&ControlBlock> for ConnectionStats {
    fn from(cb: &ControlBlock) -> Self {
        Self {
            retransmissions: cb.sender.retransmissions(),
            fast_retransmits: cb.sender.fast_retransmits(),
            cwnd: cb.sender.cwnd(),
            srtt: cb.sender.srtt(),
            rto: cb.sender.rto(),
            in_flight: cb.sender.in_flight(),
            peer_window: cb.sender.peer_window(),
            send_unacked: cb.sender.send_unacked().into(),
            send_next: cb.sender.send_next().into(),
            recv_next: cb.receiver.recv_next().into(),
            write_app_ptr: cb.sender.buffer().write_app_ptr(),
            send_ptr: cb.sender.buffer().send_ptr(),
            safe_ack_ptr: cb.sender.buffer().safe_ack_ptr(),
            send_capacity: cb.sender.buffer().capacity(),
            read_ptr: cb.receiver.buffer().read_ptr(),
            write_ptr: cb.receiver.buffer().write_ptr(),
            receive_capacity: cb.receiver.buffer().capacity(),
        }
    }
}
