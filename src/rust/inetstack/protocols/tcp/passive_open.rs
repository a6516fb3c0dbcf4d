// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::inetstack::protocols::tcp::socket::TcpSocket;
use ::std::{
    collections::VecDeque,
    net::SocketAddrV4,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Server side of a listening socket. Owns the connections that completed the handshake until they are accepted.
pub struct PassiveSocket {
    backlog: usize,
    ready: VecDeque<TcpSocket>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl PassiveSocket {
    pub fn new(backlog: usize) -> Self {
        assert!(backlog > 0);
        Self {
            backlog,
            ready: VecDeque::with_capacity(backlog),
        }
    }

    pub fn is_full(&self) -> bool {
        self.ready.len() >= self.backlog
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn push(&mut self, socket: TcpSocket) {
        debug_assert!(!self.is_full());
        self.ready.push_back(socket);
    }

    /// Hands the oldest pending connection over to the caller.
    pub fn pop(&mut self) -> Option<TcpSocket> {
        self.ready.pop_front()
    }

    /// Finds the pending connection from `remote`, if any.
    pub fn get_mut(&mut self, remote: &SocketAddrV4) -> Option<&mut TcpSocket> {
        self.ready.iter_mut().find(|socket| socket.remote() == Some(*remote))
    }

    pub fn get_by_id_mut(&mut self, id: u64) -> Option<&mut TcpSocket> {
        self.ready.iter_mut().find(|socket| socket.id() == id)
    }

    /// Drops pending connections that ended before being accepted.
    pub fn reap(&mut self) {
        self.ready.retain(|socket| {
            if socket.is_terminated() {
                debug!("reap(): dropping pending connection from {:?}", socket.remote());
                false
            } else {
                true
            }
        });
    }

    pub fn drain(&mut self) -> impl Iterator<Item = TcpSocket> + '_ {
        self.ready.drain(..)
    }
}
