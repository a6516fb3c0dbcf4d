// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::rand::{
    prelude::SliceRandom,
    Rng,
};
use ::std::collections::HashSet;

//======================================================================================================================
// Constants
//======================================================================================================================

/// First private port. See https://datatracker.ietf.org/doc/html/rfc6335 for details.
pub const FIRST_PRIVATE_PORT: u16 = 49152;
/// Last private port. See https://datatracker.ietf.org/doc/html/rfc6335 for details.
pub const LAST_PRIVATE_PORT: u16 = 65535;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Pool of ports handed out to sockets that connect without binding first.
pub struct EphemeralPorts {
    free: Vec<u16>,
    in_use: HashSet<u16>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl EphemeralPorts {
    /// Creates a pool whose allocation order is shuffled by `rng`.
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let mut free: Vec<u16> = (FIRST_PRIVATE_PORT..=LAST_PRIVATE_PORT).collect();
        free.shuffle(rng);
        Self {
            free,
            in_use: HashSet::new(),
        }
    }

    /// Asserts wether a port is in the ephemeral port range.
    pub fn is_private(port: u16) -> bool {
        port >= FIRST_PRIVATE_PORT
    }

    /// Allocates any ephemeral port from the pool.
    pub fn alloc(&mut self) -> Result<u16, Fail> {
        let port: u16 = self.free.pop().ok_or(Fail::new(
            libc::EADDRINUSE,
            "all port numbers in the ephemeral port range are currently in use",
        ))?;
        self.in_use.insert(port);
        Ok(port)
    }

    /// Takes the specified port out of the pool, for an explicit bind.
    pub fn reserve(&mut self, port: u16) -> Result<(), Fail> {
        if !Self::is_private(port) || self.in_use.contains(&port) {
            return Err(Fail::new(libc::EADDRINUSE, "port number not available"));
        }
        self.free.retain(|&p| p != port);
        self.in_use.insert(port);
        Ok(())
    }

    /// Returns a port to the pool.
    pub fn free(&mut self, port: u16) -> Result<(), Fail> {
        if !Self::is_private(port) {
            let cause: String = format!("port {} is not in the ephemeral port range", port);
            error!("free(): {}", &cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        if !self.in_use.remove(&port) {
            let cause: String = format!("port {} is already in the pool", port);
            error!("free(): {}", &cause);
            return Err(Fail::new(libc::EFAULT, &cause));
        }
        // Recently released ports go to the back of the line.
        self.free.insert(0, port);
        Ok(())
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
