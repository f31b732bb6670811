//! scrapewatch-core: client-side state synchronization for the scraping
//! session dashboard.
//!
//! Reconciles paginated REST snapshots with a stream of push events while
//! filters change underneath. Used by the CLI; knows nothing about rendering.
//!
//! # Main Entry Points
//!
//! - [`channel`] - Event channel client with reconnect and re-subscription
//! - [`cache`] - TTL cache and request cancellation/staleness tracking
//! - [`list`] - Filtered, paginated profile list synchronization
//! - [`monitor`] - Per-session monitoring roll-ups
//! - [`system`] - System-wide analytics roll-ups
//! - [`notify`] - In-process notification dispatcher
//! - [`api`] - Dashboard REST client and session control

pub mod api;
pub mod cache;
pub mod channel;
pub mod clock;
pub mod errors;
pub mod list;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod system;

pub use scrapewatch_protocol::{
    ChannelEvent, ItemStatus, ProfileCategory, ProfilePage, ProfileRecord, SessionId,
    SessionRecord, SessionStatus, SortOrder, Subject,
};

pub use api::{DashboardApi, SessionControl};
pub use channel::{ChannelClient, ReconnectPolicy, Subscription, SubjectGuard};
pub use clock::{Clock, ManualClock, TimerClass, TimerTable, TokioClock};
pub use errors::{ScrapewatchError, SyncError};
pub use list::{FilterSet, FilterUpdate, ListEngine, ListSync, ViewState};
pub use monitor::{MonitoringSnapshot, MonitorSync, SessionMonitor};
pub use notify::{Notification, NotificationDispatcher, NotificationKind};
pub use system::{SystemMonitor, SystemSync};

pub use logging::init_logging;
