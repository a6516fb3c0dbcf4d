// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::inetstack::protocols::tcp::{
    segment::{
        SegmentKind,
        TcpSegment,
    },
    SeqNumber,
};
use ::std::net::SocketAddrV4;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Client side of the handshake: a SYN is out and the matching ACK has not arrived yet.
#[derive(Debug)]
pub struct ActiveOpenSocket {
    remote: SocketAddrV4,
    local_isn: SeqNumber,
    retries: usize,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl ActiveOpenSocket {
    pub fn new(remote: SocketAddrV4, local_isn: SeqNumber) -> Self {
        Self {
            remote,
            local_isn,
            retries: 0,
        }
    }

    pub fn get_remote(&self) -> SocketAddrV4 {
        self.remote
    }

    /// SYN carrying our initial sequence number and receive window.
    pub fn syn_segment(&self, local_port: u16, window: u32) -> TcpSegment {
        TcpSegment::control(local_port, self.remote.port(), SegmentKind::Syn, self.local_isn, window)
    }

    /// First sequence number of the stream, in both directions. The peer must acknowledge exactly this value.
    pub fn expected_ack(&self) -> SeqNumber {
        self.local_isn + 1
    }

    /// Accounts for one more SYN resend. Returns `false` once `max_retries` are used up.
    pub fn retry(&mut self, max_retries: usize) -> bool {
        if self.retries >= max_retries {
            return false;
        }
        self.retries += 1;
        true
    }

    pub fn retries(&self) -> usize {
        self.retries
    }
}
