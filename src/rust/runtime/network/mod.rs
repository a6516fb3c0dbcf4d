// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod config;
pub mod consts;
pub mod ephemeral;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::Fail;
use ::std::net::Ipv4Addr;

//======================================================================================================================
// Traits
//======================================================================================================================

/// Unreliable datagram delivery.
///
/// Implementations may drop, delay, reorder or duplicate datagrams, but must not corrupt them. Datagrams addressed to
/// a host are handed back to the stack through [crate::TcpPeer::receive].
pub trait NetworkRuntime {
    /// Hands a datagram to the network. Fails if the arguments do not describe a deliverable datagram.
    fn transmit(&self, src: Ipv4Addr, dst: Ipv4Addr, bytes: Vec<u8>) -> Result<(), Fail>;
}
