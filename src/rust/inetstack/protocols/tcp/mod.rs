// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod active_open;
mod buffer;
mod established;
mod isn_generator;
mod passive_open;
pub mod peer;
pub mod segment;
mod sequence_number;
pub mod socket;
pub mod stats;

#[cfg(test)]
mod tests;

pub use self::{
    established::{
        congestion_control,
        DUP_ACK_THRESHOLD,
    },
    peer::TcpPeer,
    segment::{
        MAX_TCP_PAYLOAD,
        TCP_HEADER_SIZE,
    },
    sequence_number::SeqNumber,
    socket::{
        State,
        TimerEvent,
        TimerKind,
    },
    stats::ConnectionStats,
};
