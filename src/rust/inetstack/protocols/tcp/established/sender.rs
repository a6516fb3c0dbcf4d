// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use super::{
    congestion_control::CongestionControl,
    rto::RtoCalculator,
};
use crate::{
    inetstack::protocols::tcp::{
        buffer::SendBuffer,
        SeqNumber,
    },
    runtime::network::config::TcpConfig,
};
use ::std::{
    collections::{
        HashMap,
        VecDeque,
    },
    fmt,
    time::{
        Duration,
        Instant,
    },
};

/// Number of consecutive duplicate acknowledgments that triggers a fast retransmit.
pub const DUP_ACK_THRESHOLD: usize = 4;

/// A data segment leaving the sender, either for the first time or as a retransmission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataSegment {
    pub seq_num: SeqNumber,
    pub payload: Vec<u8>,
}

/// What an incoming acknowledgment did to the send side.
#[derive(Debug, Eq, PartialEq)]
pub enum AckOutcome {
    /// New data was acknowledged.
    Advanced,
    /// The acknowledgment repeated the oldest unacknowledged sequence number. Carries the segment to fast-retransmit,
    /// if this one crossed the threshold.
    Duplicate(Option<DataSegment>),
    /// Old, out of range, or not on a segment boundary.
    Ignored,
}

pub struct Sender {
    //
    // Send Sequence Space:
    //
    //                send_unacked               send_next
    //                     v                         v
    // ... ----------------|-------------------------|----------------------------
    //       acknowledged  |      unacknowledged     |  unsent (in the send buffer)
    //
    send_unacked: SeqNumber,
    send_next: SeqNumber,

    // Watermark (end sequence number) of every in-flight segment, oldest first.
    pending_acks: VecDeque<SeqNumber>,

    // Transmission time of every in-flight watermark that was sent exactly once.
    send_times: HashMap<SeqNumber, Instant>,

    buffer: SendBuffer,

    // Receive window last advertised by the peer.
    peer_window: u32,

    mss: usize,

    rto_calculator: RtoCalculator,
    cc: Box<dyn CongestionControl>,

    dup_ack_count: usize,
    // While set, further fast retransmits wait until everything sent before the last one is acknowledged.
    recovery_point: Option<SeqNumber>,

    retransmissions: usize,
    fast_retransmits: usize,
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Sender")
            .field("send_unacked", &self.send_unacked)
            .field("send_next", &self.send_next)
            .field("pending_acks", &self.pending_acks.len())
            .field("peer_window", &self.peer_window)
            .field("cwnd", &self.cc.get_cwnd())
            .field("rto", &self.rto_calculator.rto())
            .field("mss", &self.mss)
            .finish()
    }
}

impl Sender {
    pub fn new(seq_no: SeqNumber, peer_window: u32, config: &TcpConfig) -> Self {
        Self {
            send_unacked: seq_no,
            send_next: seq_no,
            pending_acks: VecDeque::new(),
            send_times: HashMap::new(),
            buffer: SendBuffer::new(config.get_send_buffer_size()),
            peer_window,
            mss: config.get_mss(),
            rto_calculator: RtoCalculator::new(config.get_initial_rto(), config.get_min_rto(), config.get_max_rto()),
            cc: config.new_congestion_control(),
            dup_ack_count: 0,
            recovery_point: None,
            retransmissions: 0,
            fast_retransmits: 0,
        }
    }

    /// Copies as much of `data` as the send buffer has room for.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.buffer.write(data)
    }

    /// Cuts new segments out of the send buffer as far as the congestion and peer windows allow.
    pub fn segments_to_send(&mut self, now: Instant) -> Vec<DataSegment> {
        let mut segments: Vec<DataSegment> = Vec::new();
        while self.buffer.unsent() > 0 && (self.pending_acks.len() as f64) < self.cc.get_cwnd() {
            let in_flight: usize = self.buffer.unacknowledged();
            let usable: usize = (self.peer_window as usize).saturating_sub(in_flight);
            let mut len: usize = self.mss.min(self.buffer.unsent()).min(usable);
            let probe: bool = len == 0;
            if probe {
                if in_flight > 0 {
                    break;
                }
                // The peer window is closed and nothing would tell us when it opens again.
                trace!("segments_to_send(): probing closed window");
                len = 1;
            }

            let payload: Vec<u8> = self.buffer.take_unsent(len);
            let seq_num: SeqNumber = self.send_next;
            self.send_next += len as u32;
            self.pending_acks.push_back(self.send_next);
            self.send_times.insert(self.send_next, now);
            segments.push(DataSegment { seq_num, payload });

            if probe {
                break;
            }
        }
        segments
    }

    /// Processes the acknowledgment field (`ack`) and advertised window of an ACK segment.
    pub fn on_ack(&mut self, ack: SeqNumber, window: u32, now: Instant) -> AckOutcome {
        if ack < self.send_unacked || ack > self.send_next {
            trace!("on_ack(): ack {} outside [{}, {}]", ack, self.send_unacked, self.send_next);
            return AckOutcome::Ignored;
        }

        if ack == self.send_unacked {
            self.peer_window = window;
            if self.pending_acks.is_empty() {
                // Pure window update.
                return AckOutcome::Duplicate(None);
            }
            self.dup_ack_count += 1;
            let recovered: bool = self.recovery_point.map_or(true, |point| self.send_unacked >= point);
            if self.dup_ack_count >= DUP_ACK_THRESHOLD && recovered {
                debug!("on_ack(): {} duplicate acks for {}, fast retransmit", self.dup_ack_count, ack);
                self.dup_ack_count = 0;
                self.recovery_point = Some(self.send_next);
                self.fast_retransmits += 1;
                self.retransmissions += 1;
                self.cc.on_fast_retransmit(now);
                if let Some(watermark) = self.pending_acks.front() {
                    self.send_times.remove(watermark);
                }
                return AckOutcome::Duplicate(self.oldest_segment());
            }
            return AckOutcome::Duplicate(None);
        }

        // Only segment boundaries are ever acknowledged.
        if !self.pending_acks.contains(&ack) {
            warn!("on_ack(): ack {} does not match any pending segment", ack);
            return AckOutcome::Ignored;
        }

        if let Some(sent_at) = self.send_times.get(&ack) {
            self.rto_calculator.add_sample(now.saturating_duration_since(*sent_at));
        }
        let mut acked_segments: usize = 0;
        while let Some(&watermark) = self.pending_acks.front() {
            if watermark > ack {
                break;
            }
            self.pending_acks.pop_front();
            self.send_times.remove(&watermark);
            acked_segments += 1;
        }

        self.buffer.acknowledge(ack.distance_from(self.send_unacked));
        self.send_unacked = ack;
        self.peer_window = window;
        self.dup_ack_count = 0;
        if let Some(point) = self.recovery_point {
            if self.send_unacked >= point {
                self.recovery_point = None;
            }
        }

        let min_rtt: Option<Duration> = self.rto_calculator.min_rtt();
        for _ in 0..acked_segments {
            self.cc.on_ack_received(now, min_rtt);
        }
        AckOutcome::Advanced
    }

    /// Handles the expiry of the retransmission timer armed when `watermark` was reached. Returns the segments to
    /// resend, or `None` if everything up to `watermark` was acknowledged meanwhile.
    pub fn on_retransmit_timeout(&mut self, watermark: SeqNumber, now: Instant) -> Option<Vec<DataSegment>> {
        if !self.pending_acks.contains(&watermark) {
            return None;
        }
        self.cc.on_rto(now);
        self.rto_calculator.back_off();
        // Retransmitted segments are never timed.
        self.send_times.clear();
        let segments: Vec<DataSegment> = self.unacknowledged_segments();
        self.retransmissions += segments.len();
        Some(segments)
    }

    fn oldest_segment(&self) -> Option<DataSegment> {
        let watermark: SeqNumber = *self.pending_acks.front()?;
        let len: usize = watermark.distance_from(self.send_unacked);
        Some(DataSegment {
            seq_num: self.send_unacked,
            payload: self.buffer.peek_unacknowledged(0, len),
        })
    }

    fn unacknowledged_segments(&self) -> Vec<DataSegment> {
        let mut segments: Vec<DataSegment> = Vec::with_capacity(self.pending_acks.len());
        let mut start: SeqNumber = self.send_unacked;
        for &watermark in &self.pending_acks {
            let offset: usize = start.distance_from(self.send_unacked);
            let len: usize = watermark.distance_from(start);
            segments.push(DataSegment {
                seq_num: start,
                payload: self.buffer.peek_unacknowledged(offset, len),
            });
            start = watermark;
        }
        segments
    }

    pub fn send_unacked(&self) -> SeqNumber {
        self.send_unacked
    }

    pub fn send_next(&self) -> SeqNumber {
        self.send_next
    }

    pub fn in_flight(&self) -> usize {
        self.pending_acks.len()
    }

    /// Whether every byte written so far was sent and acknowledged.
    pub fn is_flushed(&self) -> bool {
        self.buffer.is_flushed()
    }

    pub fn buffer(&self) -> &SendBuffer {
        &self.buffer
    }

    pub fn peer_window(&self) -> u32 {
        self.peer_window
    }

    pub fn rto(&self) -> Duration {
        self.rto_calculator.rto()
    }

    pub fn srtt(&self) -> Option<Duration> {
        self.rto_calculator.srtt()
    }

    pub fn cwnd(&self) -> f64 {
        self.cc.get_cwnd()
    }

    pub fn retransmissions(&self) -> usize {
        self.retransmissions
    }

    pub fn fast_retransmits(&self) -> usize {
        self.fast_retransmits
    }

    /// Whether the acknowledgment of `watermark` would produce an RTT sample.
    pub fn is_timed(&self, watermark: SeqNumber) -> bool {
        self.send_times.contains_key(&watermark)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
