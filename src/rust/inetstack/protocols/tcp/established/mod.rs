// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

pub mod congestion_control;
mod receiver;
mod rto;
mod sender;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    inetstack::protocols::tcp::SeqNumber,
    runtime::network::config::TcpConfig,
};
use ::std::time::Duration;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    receiver::Receiver,
    rto::RtoCalculator,
    sender::{
        AckOutcome,
        DataSegment,
        Sender,
        DUP_ACK_THRESHOLD,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Transmission control block of a synchronized connection.
#[derive(Debug)]
pub struct ControlBlock {
    pub sender: Sender,
    pub receiver: Receiver,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl ControlBlock {
    /// Both directions of the stream start at `seq_no`, the byte right after the SYN.
    pub fn new(seq_no: SeqNumber, peer_window: u32, config: &TcpConfig) -> Self {
        Self {
            sender: Sender::new(seq_no, peer_window, config),
            receiver: Receiver::new(seq_no, config.get_receive_buffer_size()),
        }
    }

    pub fn rto(&self) -> Duration {
        self.sender.rto()
    }
}
