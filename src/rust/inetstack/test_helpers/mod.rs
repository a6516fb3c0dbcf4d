// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

pub mod engine;
pub mod network;

pub use self::{
    engine::Engine,
    network::{
        Datagram,
        LinkConfig,
        LinkStats,
        SimulatedNetwork,
    },
};

use crate::runtime::network::config::TcpConfig;
use ::std::{
    net::Ipv4Addr,
    time::Duration,
};

//==============================================================================
// Constants
//==============================================================================

pub const ALICE_IPV4: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
pub const BOB_IPV4: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 2);
pub const CARRIE_IPV4: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 3);

//==============================================================================
// Standalone Functions
//==============================================================================

/// Configuration for tests: 1000-byte segments, room for 16 of them in each buffer, quick handshake retries.
pub fn test_tcp_config() -> TcpConfig {
    TcpConfig::default()
        .set_mss(1000)
        .set_receive_buffer_size(16_000)
        .set_send_buffer_size(16_000)
        .set_handshake_timeout(Duration::from_millis(100))
        .set_initial_rto(Duration::from_millis(100))
}
