//! System-wide analytics roll-ups.
//!
//! [`SystemMonitor`] holds the `/dashboard/system` snapshot and patches it
//! from `system:*` and queue events. [`SystemSync`] runs it on its own task
//! with a periodic refresh.

mod sync;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scrapewatch_config::ScrapewatchConfig;
use scrapewatch_protocol::{ActivityEntry, ChannelEvent, SystemMessage, SystemSnapshot};
use tracing::{debug, info, warn};

use crate::cache::{FetchOutcome, RequestTicket, RequestTracker, Settle};
use crate::clock::{TimerClass, TimerKey, TimerTable};
use crate::errors::SyncError;
use crate::monitor::MonitorAction;

pub use sync::{SystemSource, SystemSync};

const CONTEXT: &str = "system";
const ERROR_FALLBACK: &str = "System error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemSettings {
    pub refresh_interval: Duration,
    pub activity_limit: usize,
}

impl SystemSettings {
    pub fn from_config(config: &ScrapewatchConfig) -> Self {
        Self {
            refresh_interval: config.system.refresh_interval(),
            activity_limit: config.system.activity_limit(),
        }
    }
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self::from_config(&ScrapewatchConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemView {
    /// `None` until the first snapshot or metrics event arrives.
    pub snapshot: Option<SystemSnapshot>,
    pub loading: bool,
    pub error: Option<SyncError>,
    pub last_update: Option<DateTime<Utc>>,
}

pub struct SystemMonitor {
    settings: SystemSettings,
    view: Arc<SystemView>,
    tracker: RequestTracker,
    timers: TimerTable<TimerKey>,
}

impl SystemMonitor {
    pub fn new(settings: SystemSettings) -> Self {
        Self {
            settings,
            view: Arc::new(SystemView::default()),
            tracker: RequestTracker::new(),
            timers: TimerTable::new(),
        }
    }

    pub fn view(&self) -> Arc<SystemView> {
        self.view.clone()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    fn refresh_key() -> TimerKey {
        (CONTEXT.to_string(), TimerClass::PeriodicRefresh)
    }

    /// Arm the periodic refresh one interval from `now`.
    pub fn schedule_refresh(&mut self, now: Instant) {
        self.timers
            .schedule(Self::refresh_key(), now + self.settings.refresh_interval);
    }

    /// Returns true when the periodic refresh is due. The timer is re-armed.
    pub fn poll_timers(&mut self, now: Instant) -> bool {
        let due = !self.timers.take_expired(now).is_empty();
        if due {
            self.schedule_refresh(now);
        }
        due
    }

    pub fn install_snapshot(&mut self, snapshot: SystemSnapshot, at: DateTime<Utc>) {
        let view = Arc::make_mut(&mut self.view);
        view.snapshot = Some(snapshot);
        view.loading = false;
        view.error = None;
        view.last_update = Some(at);
    }

    pub fn begin_fetch(&mut self) -> RequestTicket {
        let ticket = self.tracker.begin();
        let view = Arc::make_mut(&mut self.view);
        view.loading = true;
        view.error = None;
        ticket
    }

    /// Settle a fetch. Returns true if the view changed.
    pub fn complete(
        &mut self,
        seq: u64,
        outcome: FetchOutcome<SystemSnapshot, SyncError>,
        at: DateTime<Utc>,
    ) -> bool {
        let result = match outcome {
            FetchOutcome::Canceled | FetchOutcome::Completed(Err(SyncError::Canceled)) => {
                if self.tracker.settle(seq) == Settle::Current {
                    Arc::make_mut(&mut self.view).loading = false;
                    return true;
                }
                return false;
            }
            FetchOutcome::Completed(result) => result,
        };
        if self.tracker.settle(seq) == Settle::Stale {
            debug!(event = "core.system.fetch_stale", seq = seq);
            return false;
        }
        match result {
            Ok(snapshot) => {
                info!(
                    event = "core.system.fetch_completed",
                    active_sessions = snapshot.active_sessions,
                );
                self.install_snapshot(snapshot, at);
            }
            Err(e) => {
                warn!(event = "core.system.fetch_failed", error = %e);
                let view = Arc::make_mut(&mut self.view);
                view.loading = false;
                view.error = Some(e);
            }
        }
        true
    }

    pub fn on_event(&mut self, event: &ChannelEvent, at: DateTime<Utc>) -> MonitorAction {
        match event {
            ChannelEvent::SystemMetrics(metrics) => {
                let view = Arc::make_mut(&mut self.view);
                let snapshot = view.snapshot.get_or_insert_with(SystemSnapshot::default);
                if let Some(total) = metrics.total_sessions {
                    snapshot.total_sessions = total;
                }
                if let Some(active) = metrics.active_sessions {
                    snapshot.active_sessions = active;
                }
                if let Some(rate) = metrics.processing_rate {
                    snapshot.processing_rate = rate;
                }
                if let Some(health) = &metrics.system_health {
                    snapshot.system_health = Some(health.clone());
                }
                if let Some(queues) = &metrics.queue_stats {
                    snapshot.queue_stats = queues.clone();
                }
                view.last_update = Some(at);
                MonitorAction::Updated
            }
            ChannelEvent::SystemNotification(message) => {
                let kind = message.kind.clone().unwrap_or_else(|| "info".to_string());
                let text = message.text().unwrap_or_default().to_string();
                self.record_activity(kind, text, message, at)
            }
            ChannelEvent::SystemError(message) => {
                let text = message.text().unwrap_or(ERROR_FALLBACK).to_string();
                self.record_activity("error".to_string(), text, message, at)
            }
            ChannelEvent::QueueStatusUpdate(queue) => {
                let view = Arc::make_mut(&mut self.view);
                let Some(snapshot) = view.snapshot.as_mut() else {
                    return MonitorAction::None;
                };
                snapshot
                    .queue_stats
                    .insert(queue.queue_type.clone(), queue.clone());
                view.last_update = Some(at);
                MonitorAction::Updated
            }
            ChannelEvent::SessionStatusChanged(_) => MonitorAction::Refetch,
            _ => MonitorAction::None,
        }
    }

    fn record_activity(
        &mut self,
        kind: String,
        message: String,
        source: &SystemMessage,
        at: DateTime<Utc>,
    ) -> MonitorAction {
        let limit = self.settings.activity_limit;
        let view = Arc::make_mut(&mut self.view);
        let Some(snapshot) = view.snapshot.as_mut() else {
            return MonitorAction::None;
        };
        snapshot.recent_activity.insert(
            0,
            ActivityEntry {
                timestamp: at.to_rfc3339(),
                kind,
                message,
                session_id: source.session_id.clone(),
            },
        );
        snapshot.recent_activity.truncate(limit);
        view.last_update = Some(at);
        MonitorAction::Updated
    }

    pub fn dispose(&mut self) {
        self.tracker.cancel_all();
        self.timers.clear();
    }
}

impl Drop for SystemMonitor {
    fn drop(&mut self) {
        self.tracker.cancel_all();
    }
}

impl std::fmt::Debug for SystemMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemMonitor")
            .field("settings", &self.settings)
            .field("loading", &self.view.loading)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapewatch_protocol::{QueueStatus, SessionId, SessionStatus, SessionStatusChanged, SystemMetrics};

    fn installed() -> SystemMonitor {
        let mut monitor = SystemMonitor::new(SystemSettings::default());
        monitor.install_snapshot(
            SystemSnapshot {
                total_sessions: 5,
                active_sessions: 2,
                processing_rate: 1.0,
                ..SystemSnapshot::default()
            },
            Utc::now(),
        );
        monitor
    }

    #[test]
    fn test_metrics_patch_only_present_fields() {
        let mut monitor = installed();
        let event = ChannelEvent::SystemMetrics(SystemMetrics {
            active_sessions: Some(3),
            ..SystemMetrics::default()
        });
        assert_eq!(monitor.on_event(&event, Utc::now()), MonitorAction::Updated);

        let view = monitor.view();
        let snapshot = view.snapshot.as_ref().unwrap();
        assert_eq!(snapshot.active_sessions, 3);
        assert_eq!(snapshot.total_sessions, 5);
        assert_eq!(snapshot.processing_rate, 1.0);
    }

    #[test]
    fn test_activity_is_prepended_and_capped() {
        let mut monitor = installed();
        for i in 0..55 {
            let event = ChannelEvent::SystemNotification(SystemMessage {
                message: Some(format!("note {}", i)),
                ..SystemMessage::default()
            });
            monitor.on_event(&event, Utc::now());
        }
        let view = monitor.view();
        let activity = &view.snapshot.as_ref().unwrap().recent_activity;
        assert_eq!(activity.len(), 50);
        assert_eq!(activity[0].message, "note 54");
        assert_eq!(activity[0].kind, "info");
    }

    #[test]
    fn test_system_error_without_text_uses_fallback() {
        let mut monitor = installed();
        let event = ChannelEvent::SystemError(SystemMessage {
            session_id: Some(SessionId::new("s1")),
            ..SystemMessage::default()
        });
        monitor.on_event(&event, Utc::now());
        let view = monitor.view();
        let entry = &view.snapshot.as_ref().unwrap().recent_activity[0];
        assert_eq!(entry.kind, "error");
        assert_eq!(entry.message, "System error occurred");
        assert_eq!(entry.session_id, Some(SessionId::new("s1")));
    }

    #[test]
    fn test_activity_before_snapshot_is_dropped() {
        let mut monitor = SystemMonitor::new(SystemSettings::default());
        let event = ChannelEvent::SystemError(SystemMessage::default());
        assert_eq!(monitor.on_event(&event, Utc::now()), MonitorAction::None);
        assert!(monitor.view().snapshot.is_none());
    }

    #[test]
    fn test_queue_update_keyed_by_type() {
        let mut monitor = installed();
        let event = ChannelEvent::QueueStatusUpdate(QueueStatus {
            queue_type: "profile-scraping".to_string(),
            active: 7,
            ..QueueStatus::default()
        });
        monitor.on_event(&event, Utc::now());
        let view = monitor.view();
        assert_eq!(
            view.snapshot.as_ref().unwrap().queue_stats["profile-scraping"].active,
            7
        );
    }

    #[test]
    fn test_session_status_change_requests_refetch() {
        let mut monitor = installed();
        let event = ChannelEvent::SessionStatusChanged(SessionStatusChanged {
            session_id: SessionId::new("s1"),
            status: SessionStatus::Completed,
            name: None,
        });
        assert_eq!(monitor.on_event(&event, Utc::now()), MonitorAction::Refetch);
    }

    #[test]
    fn test_refresh_timer_rearms() {
        let mut monitor = SystemMonitor::new(SystemSettings::default());
        let t0 = Instant::now();
        monitor.schedule_refresh(t0);
        assert!(!monitor.poll_timers(t0 + Duration::from_secs(29)));
        assert!(monitor.poll_timers(t0 + Duration::from_secs(30)));
        assert_eq!(monitor.next_deadline(), Some(t0 + Duration::from_secs(60)));
    }
}
