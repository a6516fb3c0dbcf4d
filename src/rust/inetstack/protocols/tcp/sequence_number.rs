// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// Byte sequence numbers of a stream. The 32-bit space wraps around, so ordering is only meaningful between numbers
// less than 2^31 apart and is computed from the signed distance between them. `Ord` is deliberately not implemented.

use ::std::{
    cmp::Ordering,
    fmt,
    ops::{
        Add,
        AddAssign,
    },
};

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct SeqNumber {
    value: u32,
}

impl SeqNumber {
    /// Number of bytes from `earlier` up to `self`. Requires `earlier <= self`.
    #[inline]
    pub fn distance_from(self, earlier: SeqNumber) -> usize {
        debug_assert!(earlier <= self);
        self.value.wrapping_sub(earlier.value) as usize
    }

    #[inline]
    fn signed_distance(&self, other: &Self) -> i32 {
        self.value.wrapping_sub(other.value) as i32
    }
}

impl From<SeqNumber> for u32 {
    #[inline]
    fn from(item: SeqNumber) -> u32 {
        item.value
    }
}

impl From<u32> for SeqNumber {
    #[inline]
    fn from(item: u32) -> Self {
        SeqNumber { value: item }
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.value.fmt(f)
    }
}

// Advance by a byte count.
impl Add<u32> for SeqNumber {
    type Output = SeqNumber;

    #[inline]
    fn add(self, bytes: u32) -> SeqNumber {
        SeqNumber::from(self.value.wrapping_add(bytes))
    }
}

impl AddAssign<u32> for SeqNumber {
    #[inline]
    fn add_assign(&mut self, bytes: u32) {
        self.value = self.value.wrapping_add(bytes);
    }
}

// Comparisons go through the signed distance, which makes them wrap-aware.
impl PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.signed_distance(other).cmp(&0))
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
