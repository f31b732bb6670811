//! Request cache and cancellation.
//!
//! [`TtlCache`] holds snapshots per cache key with read-time expiry.
//! [`RequestTracker`] issues sequence-numbered, cancelable tickets so a
//! superseded response can be recognized and dropped.

mod tracker;

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use tracker::{RequestTicket, RequestTracker, Settle};

/// Result of a cancelable fetch. Cancellation is an outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T, E> {
    Completed(Result<T, E>),
    Canceled,
}

/// Race `fut` against `token`. A cancelled token wins even if the request
/// would have completed.
pub async fn fetch_cancelable<T, E, F>(token: &CancellationToken, fut: F) -> FetchOutcome<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => FetchOutcome::Canceled,
        result = fut => {
            if token.is_cancelled() {
                FetchOutcome::Canceled
            } else {
                FetchOutcome::Completed(result)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    captured_at: Instant,
}

/// Key-addressed snapshots that expire `ttl` after capture.
///
/// There is no background sweep; an entry is checked, and dropped if stale,
/// when it is read.
#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: HashMap<String, CacheEntry<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let fresh = match self.entries.get(key) {
            Some(entry) => now.saturating_duration_since(entry.captured_at) < self.ttl,
            None => return None,
        };
        if !fresh {
            self.entries.remove(key);
            debug!(event = "core.cache.entry_expired", key = key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry whole.
    pub fn put(&mut self, key: impl Into<String>, value: V, now: Instant) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                captured_at: now,
            },
        );
    }

    /// Replace the value under `key` while keeping its capture time.
    ///
    /// Used for write-through of incremental patches, which must not extend
    /// the entry's lifetime. Returns false if there is no entry to update.
    pub fn update(&mut self, key: &str, value: V) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    pub fn evict(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many went.
    pub fn evict_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, including ones that have expired but not
    /// yet been read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
