// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod qdesc;

//==============================================================================
// Imports
//==============================================================================

use ::slab::Slab;

//==============================================================================
// Exports
//==============================================================================

pub use self::qdesc::QDesc;

//==============================================================================
// Structures
//==============================================================================

/// IO Queue Table
///
/// Owns every socket that the application holds a descriptor for.
pub struct IoQueueTable<T> {
    table: Slab<T>,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate Functions for IO Queue Tables
impl<T> IoQueueTable<T> {
    /// Allocates a new entry in the target [IoQueueTable].
    pub fn alloc(&mut self, entry: T) -> QDesc {
        let ix: usize = self.table.insert(entry);
        QDesc::from(ix as u32)
    }

    /// Gets the entry associated with an IO queue descriptor.
    pub fn get(&self, qd: QDesc) -> Option<&T> {
        self.table.get(u32::from(qd) as usize)
    }

    /// Gets the entry associated with an IO queue descriptor, mutably.
    pub fn get_mut(&mut self, qd: QDesc) -> Option<&mut T> {
        self.table.get_mut(u32::from(qd) as usize)
    }

    /// Releases an entry in the target [IoQueueTable].
    pub fn free(&mut self, qd: QDesc) -> Option<T> {
        let ix: usize = u32::from(qd) as usize;
        if !self.table.contains(ix) {
            return None;
        }

        Some(self.table.remove(ix))
    }

    /// Iterates over all live entries.
    pub fn iter(&self) -> impl Iterator<Item = (QDesc, &T)> {
        self.table.iter().map(|(ix, entry)| (QDesc::from(ix as u32), entry))
    }

    /// Iterates mutably over all live entries.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (QDesc, &mut T)> {
        self.table
            .iter_mut()
            .map(|(ix, entry)| (QDesc::from(ix as u32), entry))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl<T> Default for IoQueueTable<T> {
    fn default() -> Self {
        Self { table: Slab::new() }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
