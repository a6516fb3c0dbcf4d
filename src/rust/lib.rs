// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

pub mod inetstack;
pub mod runtime;

pub use self::{
    inetstack::{
        protocols::tcp::{
            peer::TcpPeer,
            socket::{
                State,
                TimerEvent,
            },
            stats::ConnectionStats,
        },
        test_helpers::{
            Engine,
            LinkConfig,
            SimulatedNetwork,
        },
    },
    runtime::{
        fail::Fail,
        network::{
            config::{
                Config,
                TcpConfig,
            },
            NetworkRuntime,
        },
        timer::SharedTimer,
        QDesc,
    },
};
