//! Timer service: a priority queue of scheduled jobs keyed by absolute
//! fire time.
//!
//! Registrations are one-shot or recurring and are addressed by an opaque
//! [`TimerHandle`]. The heap uses lazy deletion: cancelling or re-arming a
//! registration leaves its old heap entry behind, and stale entries are
//! discarded when they reach the top. A recurring registration keeps its
//! handle across re-arms, so there is only ever one live entry per handle.
//!
//! The service never reads the clock; callers pass `now` explicitly and
//! drive it with [`TimerService::pop_due`].

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

/// Opaque identifier of a scheduler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl core::fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

#[derive(Debug)]
struct Registration<T> {
    due: DateTime<Utc>,
    seq: u64,
    interval: Option<TimeDelta>,
    payload: T,
}

/// Min-heap scheduler of payloads.
#[derive(Debug)]
pub struct TimerService<T> {
    heap: BinaryHeap<Reverse<(DateTime<Utc>, u64, TimerHandle)>>,
    entries: HashMap<TimerHandle, Registration<T>>,
    next_handle: u64,
    next_seq: u64,
}

impl<T> Default for TimerService<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerService<T> {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            entries: HashMap::new(),
            next_handle: 1,
            next_seq: 0,
        }
    }

    /// Register a job that runs once at `due`.
    pub fn schedule_once(&mut self, due: DateTime<Utc>, payload: T) -> TimerHandle {
        self.register(due, None, payload)
    }

    /// Register a job that first runs at `first_due`, then every `interval`.
    ///
    /// A non-positive interval degrades to a one-shot registration.
    pub fn schedule_recurring(
        &mut self,
        first_due: DateTime<Utc>,
        interval: TimeDelta,
        payload: T,
    ) -> TimerHandle {
        let interval = (interval > TimeDelta::zero()).then_some(interval);
        self.register(first_due, interval, payload)
    }

    /// Cancel a registration.
    ///
    /// Cancelling an unknown or already-fired handle is a no-op and returns
    /// `false`.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        if self.entries.remove(&handle).is_some() {
            true
        } else {
            debug!(handle = %handle, "Cancel of unknown or fired timer ignored");
            false
        }
    }

    /// Whether the handle still has a pending registration.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Number of pending registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending fire time.
    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        self.discard_stale();
        self.heap.peek().map(|Reverse((due, _, _))| *due)
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    fn register(
        &mut self,
        due: DateTime<Utc>,
        interval: Option<TimeDelta>,
        payload: T,
    ) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        let seq = self.bump_seq();
        self.entries.insert(
            handle,
            Registration {
                due,
                seq,
                interval,
                payload,
            },
        );
        self.heap.push(Reverse((due, seq, handle)));
        handle
    }

    const fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    fn is_live(&self, seq: u64, handle: TimerHandle) -> bool {
        self.entries.get(&handle).is_some_and(|r| r.seq == seq)
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse((_, seq, handle))) = self.heap.peek().copied() {
            if self.is_live(seq, handle) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<T: Clone> TimerService<T> {
    /// Pop the next job due at or before `now`.
    ///
    /// One-shot registrations are removed. Recurring ones are re-armed at
    /// the first multiple of their interval after `now`, so a long stall
    /// yields a single catch-up firing rather than a burst.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<(TimerHandle, T)> {
        self.discard_stale();
        let Reverse((due, _, handle)) = *self.heap.peek()?;
        if due > now {
            return None;
        }
        self.heap.pop();
        let interval = self.entries.get(&handle)?.interval;
        let Some(interval) = interval else {
            let registration = self.entries.remove(&handle)?;
            return Some((handle, registration.payload));
        };

        let mut next = due;
        while next <= now {
            let Some(advanced) = next.checked_add_signed(interval) else {
                // Out of representable time: drop the registration.
                let registration = self.entries.remove(&handle)?;
                return Some((handle, registration.payload));
            };
            next = advanced;
        }
        let seq = self.bump_seq();
        let registration = self.entries.get_mut(&handle)?;
        registration.due = next;
        registration.seq = seq;
        let payload = registration.payload.clone();
        self.heap.push(Reverse((next, seq, handle)));
        Some((handle, payload))
    }
}
