// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use ::std::fmt;

//==============================================================================
// Structures
//==============================================================================

/// IO Queue Descriptor
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct QDesc(u32);

//==============================================================================
// Trait Implementations
//==============================================================================

impl From<QDesc> for u32 {
    /// Converts a [QDesc] to a [u32].
    fn from(val: QDesc) -> Self {
        val.0
    }
}

impl From<u32> for QDesc {
    /// Converts a [u32] to a [QDesc].
    fn from(val: u32) -> Self {
        QDesc(val)
    }
}

impl fmt::Display for QDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qd{}", self.0)
    }
}
