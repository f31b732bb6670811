//! Time source and the pending-timer table.
//!
//! Every debounce and batch window in the crate is a deadline in a
//! [`TimerTable`], checked against a [`Clock`]. Sans-IO state machines take
//! `now` as an argument; async drivers read it from a clock and sleep until
//! [`TimerTable::next_deadline`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Reads tokio's clock, so paused-time tests advance it deterministically.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        self.start + *elapsed
    }
}

/// Kind of pending timer. One timer per (context, class) at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerClass {
    /// Settle window for depth/status/type/sort edits.
    FilterDebounce,
    /// Settle window for free-text search edits.
    SearchDebounce,
    /// Coalesces `session:progress` events.
    ProgressDebounce,
    /// Fixed window over which item status updates are buffered.
    StatusBatch,
    /// Periodic snapshot refresh.
    PeriodicRefresh,
}

/// Timer identity: the owning context plus the timer class.
pub type TimerKey = (String, TimerClass);

/// Deadlines keyed by `K`.
///
/// `schedule` is cancel-and-replace: a key holds at most one deadline, and
/// scheduling it again moves the deadline. `schedule_if_idle` leaves an
/// existing deadline alone, which gives fixed windows instead of trailing
/// debounce.
#[derive(Debug, Clone)]
pub struct TimerTable<K> {
    deadlines: HashMap<K, Instant>,
}

impl<K: Clone + Eq + Hash> TimerTable<K> {
    pub fn new() -> Self {
        Self {
            deadlines: HashMap::new(),
        }
    }

    /// Set `key` to fire at `deadline`. Returns true if an earlier timer was replaced.
    pub fn schedule(&mut self, key: K, deadline: Instant) -> bool {
        self.deadlines.insert(key, deadline).is_some()
    }

    /// Set `key` only if it has no pending deadline. Returns true if scheduled.
    pub fn schedule_if_idle(&mut self, key: K, deadline: Instant) -> bool {
        if self.deadlines.contains_key(&key) {
            return false;
        }
        self.deadlines.insert(key, deadline);
        true
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.deadlines.remove(key).is_some()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every key whose deadline is at or before `now`,
    /// earliest first.
    pub fn take_expired(&mut self, now: Instant) -> Vec<K> {
        let mut expired: Vec<(K, Instant)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (key.clone(), *deadline))
            .collect();
        expired.sort_by_key(|(_, deadline)| *deadline);
        for (key, _) in &expired {
            self.deadlines.remove(key);
        }
        expired.into_iter().map(|(key, _)| key).collect()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

impl<K: Clone + Eq + Hash> Default for TimerTable<K> {
    fn default() -> Self {
        Self::new()
    }
}
