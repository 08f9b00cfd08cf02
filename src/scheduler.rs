//! Virtual-clock scheduling
//!
//! Agents never block: every piece of delayed work is a new event on a
//! single-threaded queue. Events are dispatched in nondecreasing time order;
//! ties are broken first by dispatch class (so a role compromise due at `t`
//! lands before any compute tick at `t`), then by insertion order.

use core::cmp::Ordering;
use core::fmt;
use core::ops::Add;
use core::time::Duration;
use std::collections::{BinaryHeap, HashSet};

use crate::types::*;

/// Simulated time since the start of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    /// Start of the simulation
    pub const ZERO: SimTime = SimTime(Duration::ZERO);

    /// Create from a duration since start
    pub const fn from_duration(elapsed: Duration) -> Self {
        Self(elapsed)
    }

    /// Create from seconds since start
    pub fn from_secs_f64(secs: f64) -> Result<Self> {
        Duration::try_from_secs_f64(secs)
            .map(Self)
            .map_err(|_| SwarmError::ConfigError("time must be finite and non-negative"))
    }

    /// Elapsed time since start
    pub const fn as_duration(&self) -> Duration {
        self.0
    }

    /// Seconds since start
    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Time remaining until `later`, zero if `later` is in the past
    pub fn until(&self, later: SimTime) -> Duration {
        later.0.saturating_sub(self.0)
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// Handle to a scheduled event, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    /// Raw sequence number
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Dispatch class of an event; lower classes run first among same-time events
pub trait Prioritized {
    /// Dispatch class (default 1)
    fn dispatch_class(&self) -> u8 {
        1
    }
}

/// Scheduling interface consumed by agents
pub trait Scheduler<E> {
    /// Current simulated time
    fn now(&self) -> SimTime;

    /// Schedule `event` to fire `delay` after now
    fn schedule_after(&mut self, delay: Duration, event: E) -> EventId;

    /// Cancel a pending event; returns false if it already fired or was cancelled
    fn cancel(&mut self, id: EventId) -> bool;
}

struct Entry<E> {
    time: SimTime,
    class: u8,
    seq: u64,
    event: E,
}

impl<E> Entry<E> {
    fn key(&self) -> (SimTime, u8, u64) {
        (self.time, self.class, self.seq)
    }
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap is a max-heap: reverse so the earliest key pops first
impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Single-threaded priority queue of timed events
pub struct EventQueue<E> {
    now: SimTime,
    heap: BinaryHeap<Entry<E>>,
    pending: HashSet<u64>,
    next_seq: u64,
    stop_at: Option<SimTime>,
    dispatched: u64,
}

impl<E: Prioritized> EventQueue<E> {
    /// Create an empty queue at time zero
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            next_seq: 0,
            stop_at: None,
            dispatched: 0,
        }
    }

    /// Schedule `event` at an absolute time (clamped to now)
    pub fn schedule_at(&mut self, time: SimTime, event: E) -> EventId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(seq);
        self.heap.push(Entry {
            time: time.max(self.now),
            class: event.dispatch_class(),
            seq,
            event,
        });
        EventId(seq)
    }

    /// Stop dispatching at `time`: events due at or after it never fire
    pub fn stop_at(&mut self, time: SimTime) {
        self.stop_at = Some(time);
    }

    /// Configured stop time
    pub fn stop_time(&self) -> Option<SimTime> {
        self.stop_at
    }

    /// Remove the next live event and advance the clock to it
    pub fn pop(&mut self) -> Option<(EventId, E)> {
        while let Some(entry) = self.heap.pop() {
            if !self.pending.remove(&entry.seq) {
                continue;
            }
            if self.stop_at.is_some_and(|stop| entry.time >= stop) {
                self.pending.clear();
                self.heap.clear();
                return None;
            }
            self.now = entry.time;
            self.dispatched += 1;
            return Some((EventId(entry.seq), entry.event));
        }
        None
    }

    /// Time of the next live event
    pub fn peek_time(&mut self) -> Option<SimTime> {
        while let Some(entry) = self.heap.peek() {
            if self.pending.contains(&entry.seq) {
                return Some(entry.time);
            }
            self.heap.pop();
        }
        None
    }

    /// Check if an event is still pending
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains(&id.0)
    }

    /// Number of live events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if no live events remain
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Events dispatched so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl<E: Prioritized> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Prioritized> Scheduler<E> for EventQueue<E> {
    fn now(&self) -> SimTime {
        self.now
    }

    fn schedule_after(&mut self, delay: Duration, event: E) -> EventId {
        let at = self.now + delay;
        self.schedule_at(at, event)
    }

    fn cancel(&mut self, id: EventId) -> bool {
        // Cancelled entries stay in the heap and are skipped on pop
        self.pending.remove(&id.0)
    }
}
