// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::std::{
    cell::RefCell,
    cmp::{
        Ordering,
        Reverse,
    },
    collections::BinaryHeap,
    rc::Rc,
    time::{
        Duration,
        Instant,
    },
};

//==============================================================================
// Structures
//==============================================================================

struct TimerQueueEntry<E> {
    expiry: Instant,
    // Breaks ties between entries that expire at the same instant, so that they fire in scheduling order.
    seq: u64,
    event: E,
}

/// Timer that holds one or more events for future wake up.
///
/// Entries cannot be cancelled. Whoever consumes a fired event must check that it still applies.
pub struct Timer<E> {
    now: Instant,
    next_seq: u64,
    // Use a reverse to get a min heap.
    heap: BinaryHeap<Reverse<TimerQueueEntry<E>>>,
}

/// Shared handle to a [Timer].
pub struct SharedTimer<E>(Rc<RefCell<Timer<E>>>);

//==============================================================================
// Associate Functions
//==============================================================================

impl<E> SharedTimer<E> {
    pub fn new(now: Instant) -> Self {
        Self(Rc::new(RefCell::new(Timer {
            now,
            next_seq: 0,
            heap: BinaryHeap::new(),
        })))
    }

    pub fn now(&self) -> Instant {
        self.0.borrow().now
    }

    /// Schedules `event` to fire `timeout` after the current time.
    pub fn schedule(&self, timeout: Duration, event: E) {
        let mut timer = self.0.borrow_mut();
        let expiry: Instant = timer.now + timeout;
        let seq: u64 = timer.next_seq;
        timer.next_seq += 1;
        timer.heap.push(Reverse(TimerQueueEntry { expiry, seq, event }));
    }

    /// Moves the clock forward and returns every event that expired, earliest first.
    pub fn advance_clock(&self, now: Instant) -> Vec<E> {
        let mut timer = self.0.borrow_mut();
        assert!(timer.now <= now);
        timer.now = now;

        let mut expired: Vec<E> = Vec::new();
        while let Some(Reverse(entry)) = timer.heap.peek() {
            if now < entry.expiry {
                break;
            }
            if let Some(Reverse(entry)) = timer.heap.pop() {
                expired.push(entry.event);
            }
        }
        expired
    }

    /// Gets the instant at which the next event expires, if any.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.0.borrow().heap.peek().map(|Reverse(entry)| entry.expiry)
    }

    /// Gets the number of events that have not fired yet.
    pub fn pending(&self) -> usize {
        self.0.borrow().heap.len()
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl<E> Clone for SharedTimer<E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E> PartialEq for TimerQueueEntry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.expiry == other.expiry && self.seq == other.seq
    }
}

impl<E> Eq for TimerQueueEntry<E> {}

impl<E> PartialOrd for TimerQueueEntry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for TimerQueueEntry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expiry
            .cmp(&other.expiry)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
