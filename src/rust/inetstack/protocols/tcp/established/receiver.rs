// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::inetstack::protocols::tcp::{
    buffer::ReceiveBuffer,
    SeqNumber,
};

/// Receive side of a connection: accepts data strictly in order, never buffers anything out of order.
#[derive(Debug)]
pub struct Receiver {
    // Next byte expected from the peer. In RFC 793 terms, this is RCV.NXT.
    recv_next: SeqNumber,
    buffer: ReceiveBuffer,
}

impl Receiver {
    pub fn new(recv_next: SeqNumber, capacity: usize) -> Self {
        Self {
            recv_next,
            buffer: ReceiveBuffer::new(capacity),
        }
    }

    /// Offers a data segment. It is taken only if it starts at the next expected byte and fits entirely.
    pub fn on_data(&mut self, seq_num: SeqNumber, payload: &[u8]) -> bool {
        if seq_num != self.recv_next {
            trace!("on_data(): out of order segment {} (expected {})", seq_num, self.recv_next);
            return false;
        }
        if payload.len() > self.buffer.available() {
            trace!("on_data(): {} bytes do not fit in window {}", payload.len(), self.buffer.available());
            return false;
        }
        let n: usize = self.buffer.write(payload);
        debug_assert_eq!(n, payload.len());
        self.recv_next += n as u32;
        true
    }

    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.buffer.read(buf)
    }

    pub fn recv_next(&self) -> SeqNumber {
        self.recv_next
    }

    /// Window to advertise to the peer.
    pub fn window(&self) -> u32 {
        self.buffer.available() as u32
    }

    pub fn has_unread(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &ReceiveBuffer {
        &self.buffer
    }
}
