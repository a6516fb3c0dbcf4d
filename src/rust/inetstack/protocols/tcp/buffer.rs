// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// Fixed-capacity ring buffers backing a connection. Positions are monotonic byte counters; the ring index of a counter
// is the counter modulo the capacity.

//======================================================================================================================
// Structures
//======================================================================================================================

/// Bytes received in order and not yet read by the application.
#[derive(Debug)]
pub struct ReceiveBuffer {
    ring: Vec<u8>,
    read_ptr: u64,
    write_ptr: u64,
}

/// Bytes written by the application and not yet acknowledged by the peer.
///
/// `write_app_ptr >= send_ptr >= safe_ack_ptr`: bytes in `[safe_ack_ptr, send_ptr)` are in flight and kept for
/// retransmission, bytes in `[send_ptr, write_app_ptr)` have never been sent.
#[derive(Debug)]
pub struct SendBuffer {
    ring: Vec<u8>,
    write_app_ptr: u64,
    send_ptr: u64,
    safe_ack_ptr: u64,
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn copy_in(ring: &mut [u8], pos: u64, data: &[u8]) {
    let capacity: usize = ring.len();
    let start: usize = (pos % capacity as u64) as usize;
    let first: usize = data.len().min(capacity - start);
    ring[start..start + first].copy_from_slice(&data[..first]);
    ring[..data.len() - first].copy_from_slice(&data[first..]);
}

fn copy_out(ring: &[u8], pos: u64, out: &mut [u8]) {
    let capacity: usize = ring.len();
    let start: usize = (pos % capacity as u64) as usize;
    let first: usize = out.len().min(capacity - start);
    out[..first].copy_from_slice(&ring[start..start + first]);
    let rest: usize = out.len() - first;
    out[first..].copy_from_slice(&ring[..rest]);
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl ReceiveBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            ring: vec![0; capacity],
            read_ptr: 0,
            write_ptr: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        (self.write_ptr - self.read_ptr) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.write_ptr == self.read_ptr
    }

    /// Free space, which is what gets advertised as the receive window.
    pub fn available(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Appends as much of `data` as fits and returns how much that was.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n: usize = data.len().min(self.available());
        copy_in(&mut self.ring, self.write_ptr, &data[..n]);
        self.write_ptr += n as u64;
        n
    }

    /// Moves up to `buf.len()` buffered bytes into `buf`.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n: usize = buf.len().min(self.len());
        copy_out(&self.ring, self.read_ptr, &mut buf[..n]);
        self.read_ptr += n as u64;
        n
    }

    pub fn read_ptr(&self) -> u64 {
        self.read_ptr
    }

    pub fn write_ptr(&self) -> u64 {
        self.write_ptr
    }
}

impl SendBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            ring: vec![0; capacity],
            write_app_ptr: 0,
            send_ptr: 0,
            safe_ack_ptr: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Space left for the application.
    pub fn available(&self) -> usize {
        self.capacity() - (self.write_app_ptr - self.safe_ack_ptr) as usize
    }

    /// Bytes written by the application and never sent.
    pub fn unsent(&self) -> usize {
        (self.write_app_ptr - self.send_ptr) as usize
    }

    /// Bytes sent at least once and not yet acknowledged.
    pub fn unacknowledged(&self) -> usize {
        (self.send_ptr - self.safe_ack_ptr) as usize
    }

    /// Whether everything the application wrote has been sent and acknowledged.
    pub fn is_flushed(&self) -> bool {
        self.write_app_ptr == self.safe_ack_ptr
    }

    /// Copies as much of `data` as fits and returns how much that was.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n: usize = data.len().min(self.available());
        copy_in(&mut self.ring, self.write_app_ptr, &data[..n]);
        self.write_app_ptr += n as u64;
        n
    }

    /// Hands out up to `max` never-sent bytes and marks them as sent.
    pub fn take_unsent(&mut self, max: usize) -> Vec<u8> {
        let n: usize = max.min(self.unsent());
        let mut out: Vec<u8> = vec![0; n];
        copy_out(&self.ring, self.send_ptr, &mut out);
        self.send_ptr += n as u64;
        out
    }

    /// Copies `len` in-flight bytes starting `offset` bytes past the oldest unacknowledged one.
    pub fn peek_unacknowledged(&self, offset: usize, len: usize) -> Vec<u8> {
        assert!(offset + len <= self.unacknowledged());
        let mut out: Vec<u8> = vec![0; len];
        copy_out(&self.ring, self.safe_ack_ptr + offset as u64, &mut out);
        out
    }

    /// Releases `n` acknowledged bytes.
    pub fn acknowledge(&mut self, n: usize) {
        assert!(n <= self.unacknowledged());
        self.safe_ack_ptr += n as u64;
    }

    pub fn write_app_ptr(&self) -> u64 {
        self.write_app_ptr
    }

    pub fn send_ptr(&self) -> u64 {
        self.send_ptr
    }

    pub fn safe_ack_ptr(&self) -> u64 {
        self.safe_ack_ptr
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
