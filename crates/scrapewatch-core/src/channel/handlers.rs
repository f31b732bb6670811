use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use scrapewatch_protocol::ChannelEvent;
use tracing::error;

pub type EventHandler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Handlers keyed by event name.
///
/// The lock is only held to add, remove, or snapshot handlers; handlers
/// themselves run unlocked so they may subscribe or publish.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<String, Vec<(u64, EventHandler)>>>,
}

impl HandlerRegistry {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<(u64, EventHandler)>>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn add(&self, name: &str, handler: EventHandler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(name.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    pub(crate) fn remove(&self, name: &str, id: u64) -> bool {
        let mut handlers = self.lock();
        let Some(list) = handlers.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(handler_id, _)| *handler_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(name);
        }
        removed
    }

    /// Run every handler registered for the event's name. A panicking handler
    /// is logged and skipped. Returns how many handlers ran to completion.
    pub(crate) fn dispatch(&self, event: &ChannelEvent) -> usize {
        let name = event.name();
        let snapshot: Vec<EventHandler> = match self.lock().get(name) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(event = "core.channel.handler_panicked", name = name),
            }
        }
        delivered
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, Vec::len)
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }
}
