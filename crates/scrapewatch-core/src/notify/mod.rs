//! In-process notification fan-out.
//!
//! Notifications are delivered synchronously to whoever is subscribed at
//! the time of the call and are not stored.

mod bridge;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use scrapewatch_config::ScrapewatchConfig;
use tracing::debug;

pub use bridge::{NotificationDraft, install_bridge, notification_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    /// How long a presenter should keep it visible.
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
}

type Listener = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl Registry {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Broadcasts [`Notification`]s to subscribers. Cheap to clone.
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: Arc<Registry>,
    default_duration: Duration,
}

impl NotificationDispatcher {
    pub fn new(default_duration: Duration) -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
            default_duration,
        }
    }

    pub fn from_config(config: &ScrapewatchConfig) -> Self {
        Self::new(config.notify.default_duration())
    }

    /// Register a listener. It stays registered until the returned guard
    /// is dropped.
    pub fn subscribe<F>(&self, listener: F) -> NotificationSubscription
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().push((id, Arc::new(listener)));
        NotificationSubscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn notify(&self, kind: NotificationKind, title: &str, message: Option<&str>) -> Notification {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: title.to_string(),
            message: message.map(str::to_string),
            duration: self.default_duration,
            created_at: Utc::now(),
        };

        let listeners: Vec<Listener> = self
            .registry
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in &listeners {
            listener(&notification);
        }
        debug!(
            event = "core.notify.dispatch_completed",
            kind = %kind,
            title = title,
            listeners = listeners.len(),
        );
        notification
    }

    pub fn success(&self, title: &str, message: Option<&str>) -> Notification {
        self.notify(NotificationKind::Success, title, message)
    }

    pub fn error(&self, title: &str, message: Option<&str>) -> Notification {
        self.notify(NotificationKind::Error, title, message)
    }

    pub fn warning(&self, title: &str, message: Option<&str>) -> Notification {
        self.notify(NotificationKind::Warning, title, message)
    }

    pub fn info(&self, title: &str, message: Option<&str>) -> Notification {
        self.notify(NotificationKind::Info, title, message)
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::from_config(&ScrapewatchConfig::default())
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("subscribers", &self.subscriber_count())
            .field("default_duration", &self.default_duration)
            .finish()
    }
}

/// Unregisters its listener on drop.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct NotificationSubscription {
    registry: Weak<Registry>,
    id: u64,
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
