// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    inetstack::protocols::tcp::SeqNumber,
    runtime::fail::Fail,
};
use ::libc::EBADMSG;
use ::std::fmt;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Size of the transport header on the wire:
/// `src_port:u16 dst_port:u16 kind:u8 window:u32 seq_num:u32 payload_len:u16`, all big endian.
pub const TCP_HEADER_SIZE: usize = 15;

/// Largest payload the header can describe.
pub const MAX_TCP_PAYLOAD: usize = u16::MAX as usize;

//======================================================================================================================
// Structures
//======================================================================================================================

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SegmentKind {
    Syn,
    Ack,
    Data,
    Fin,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub kind: SegmentKind,
    /// Receive window advertised by the sender of this segment (bytes). Only meaningful on ACKs.
    pub window: u32,
    /// First byte of the payload for SYN/DATA/FIN; the next expected byte for ACK.
    pub seq_num: SeqNumber,
}

#[derive(Clone, Eq, PartialEq)]
pub struct TcpSegment {
    pub header: TcpHeader,
    pub payload: Vec<u8>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl SegmentKind {
    fn to_wire(self) -> u8 {
        match self {
            SegmentKind::Syn => 0,
            SegmentKind::Ack => 1,
            SegmentKind::Data => 2,
            SegmentKind::Fin => 3,
        }
    }

    fn from_wire(value: u8) -> Result<Self, Fail> {
        match value {
            0 => Ok(SegmentKind::Syn),
            1 => Ok(SegmentKind::Ack),
            2 => Ok(SegmentKind::Data),
            3 => Ok(SegmentKind::Fin),
            _ => Err(Fail::new(EBADMSG, "invalid segment type")),
        }
    }
}

impl TcpHeader {
    pub fn new(src_port: u16, dst_port: u16, kind: SegmentKind, seq_num: SeqNumber) -> Self {
        Self {
            src_port,
            dst_port,
            kind,
            window: 0,
            seq_num,
        }
    }

    fn serialize(&self, buf: &mut [u8], payload_len: u16) {
        buf[0..2].copy_from_slice(&self.src_port.to_be_bytes());
        buf[2..4].copy_from_slice(&self.dst_port.to_be_bytes());
        buf[4] = self.kind.to_wire();
        buf[5..9].copy_from_slice(&self.window.to_be_bytes());
        buf[9..13].copy_from_slice(&u32::from(self.seq_num).to_be_bytes());
        buf[13..15].copy_from_slice(&payload_len.to_be_bytes());
    }
}

impl TcpSegment {
    pub fn new(header: TcpHeader, payload: Vec<u8>) -> Self {
        assert!(payload.len() <= MAX_TCP_PAYLOAD);
        Self { header, payload }
    }

    /// Builds a segment without payload.
    pub fn control(src_port: u16, dst_port: u16, kind: SegmentKind, seq_num: SeqNumber, window: u32) -> Self {
        let mut header: TcpHeader = TcpHeader::new(src_port, dst_port, kind, seq_num);
        header.window = window;
        Self::new(header, Vec::new())
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = vec![0; TCP_HEADER_SIZE + self.payload.len()];
        self.header.serialize(&mut buf[..TCP_HEADER_SIZE], self.payload.len() as u16);
        buf[TCP_HEADER_SIZE..].copy_from_slice(&self.payload);
        buf
    }

    pub fn parse(buf: &[u8]) -> Result<Self, Fail> {
        if buf.len() < TCP_HEADER_SIZE {
            return Err(Fail::new(EBADMSG, "TCP segment too small"));
        }
        let (hdr_buf, data_buf): (&[u8], &[u8]) = buf.split_at(TCP_HEADER_SIZE);

        let src_port: u16 = u16::from_be_bytes([hdr_buf[0], hdr_buf[1]]);
        let dst_port: u16 = u16::from_be_bytes([hdr_buf[2], hdr_buf[3]]);
        let kind: SegmentKind = SegmentKind::from_wire(hdr_buf[4])?;
        let window: u32 = u32::from_be_bytes([hdr_buf[5], hdr_buf[6], hdr_buf[7], hdr_buf[8]]);
        let seq_num: SeqNumber =
            SeqNumber::from(u32::from_be_bytes([hdr_buf[9], hdr_buf[10], hdr_buf[11], hdr_buf[12]]));
        let payload_len: usize = u16::from_be_bytes([hdr_buf[13], hdr_buf[14]]) as usize;

        if data_buf.len() != payload_len {
            return Err(Fail::new(EBADMSG, "TCP payload length mismatch"));
        }
        if payload_len > 0 && kind != SegmentKind::Data {
            return Err(Fail::new(EBADMSG, "payload on a control segment"));
        }

        let header: TcpHeader = TcpHeader {
            src_port,
            dst_port,
            kind,
            window,
            seq_num,
        };
        Ok(Self::new(header, data_buf.to_vec()))
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl fmt::Debug for TcpSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}->{} seq={} win={} len={}",
            self.header.kind,
            self.header.src_port,
            self.header.dst_port,
            self.header.seq_num,
            self.header.window,
            self.payload.len()
        )
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
