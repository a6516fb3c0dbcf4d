// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod tcp;
mod yaml;

//==============================================================================
// Exports
//==============================================================================

pub use self::{
    tcp::TcpConfig,
    yaml::Config,
};
