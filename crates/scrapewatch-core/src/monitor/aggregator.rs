use std::sync::Arc;
use std::time::{Duration, Instant};

use scrapewatch_config::ScrapewatchConfig;
use scrapewatch_protocol::{
    ChannelEvent, CurrentBatch, ItemStatus, MonitoringPayload, ProfileStatusUpdate,
    SessionId, SessionProgress,
};
use tracing::{debug, info, warn};

use crate::cache::{FetchOutcome, RequestTicket, RequestTracker, Settle};
use crate::clock::{TimerClass, TimerKey, TimerTable};
use crate::errors::SyncError;

use super::normalize::normalize;
use super::{MonitorAction, MonitoringSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub progress_debounce: Duration,
    pub status_batch_window: Duration,
    pub recent_limit: usize,
}

impl MonitorSettings {
    pub fn from_config(config: &ScrapewatchConfig) -> Self {
        Self {
            progress_debounce: config.monitor.progress_debounce(),
            status_batch_window: config.monitor.status_batch_window(),
            recent_limit: config.monitor.recent_limit(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&ScrapewatchConfig::default())
    }
}

/// Keeps one session's [`MonitoringSnapshot`] current between fetches.
///
/// `session:progress` events are debounced; only the newest one is merged.
/// Item status updates are buffered over a fixed window and folded into the
/// depth counters in one pass.
pub struct SessionMonitor {
    session: SessionId,
    context: String,
    settings: MonitorSettings,
    snapshot: Arc<MonitoringSnapshot>,
    tracker: RequestTracker,
    pending_progress: Option<SessionProgress>,
    pending_statuses: Vec<ProfileStatusUpdate>,
    timers: TimerTable<TimerKey>,
}

impl SessionMonitor {
    pub fn new(session: SessionId, settings: MonitorSettings) -> Self {
        let context = format!("monitor:{}", session);
        Self {
            session,
            context,
            settings,
            snapshot: Arc::new(MonitoringSnapshot::default()),
            tracker: RequestTracker::new(),
            pending_progress: None,
            pending_statuses: Vec::new(),
            timers: TimerTable::new(),
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn snapshot(&self) -> Arc<MonitoringSnapshot> {
        self.snapshot.clone()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    fn key(&self, class: TimerClass) -> TimerKey {
        (self.context.clone(), class)
    }

    /// Replace the whole snapshot. Buffered events stay buffered and land
    /// on top of it when their timers fire.
    pub fn install_snapshot(&mut self, snapshot: MonitoringSnapshot) {
        self.snapshot = Arc::new(snapshot);
    }

    /// Start a snapshot fetch, superseding any outstanding one.
    pub fn begin_fetch(&mut self) -> RequestTicket {
        let ticket = self.tracker.begin();
        let snapshot = Arc::make_mut(&mut self.snapshot);
        snapshot.loading = true;
        debug!(event = "core.monitor.fetch_started", context = %self.context, seq = ticket.seq);
        ticket
    }

    /// Settle a fetch started by [`begin_fetch`](Self::begin_fetch).
    /// Returns true if the snapshot changed.
    pub fn complete(
        &mut self,
        seq: u64,
        outcome: FetchOutcome<MonitoringPayload, SyncError>,
    ) -> bool {
        let result = match outcome {
            FetchOutcome::Canceled | FetchOutcome::Completed(Err(SyncError::Canceled)) => {
                if self.tracker.settle(seq) == Settle::Current {
                    Arc::make_mut(&mut self.snapshot).loading = false;
                    return true;
                }
                return false;
            }
            FetchOutcome::Completed(result) => result,
        };
        if self.tracker.settle(seq) == Settle::Stale {
            debug!(event = "core.monitor.fetch_stale", context = %self.context, seq = seq);
            return false;
        }

        match result {
            Ok(payload) => {
                let snapshot = normalize(payload);
                info!(
                    event = "core.monitor.fetch_completed",
                    context = %self.context,
                    depths = snapshot.depth_stats.len(),
                    progress = snapshot.overall_progress,
                );
                self.install_snapshot(snapshot);
            }
            Err(e) => {
                warn!(event = "core.monitor.fetch_failed", context = %self.context, error = %e);
                let snapshot = Arc::make_mut(&mut self.snapshot);
                snapshot.loading = false;
                snapshot.error = Some(e);
            }
        }
        true
    }

    /// Route one channel event.
    pub fn on_event(&mut self, event: &ChannelEvent, now: Instant) -> MonitorAction {
        if let Some(session) = event.session_id()
            && *session != self.session
        {
            return MonitorAction::None;
        }

        match event {
            ChannelEvent::SessionProgress(progress) => {
                self.pending_progress = Some(progress.clone());
                let key = self.key(TimerClass::ProgressDebounce);
                self.timers
                    .schedule(key, now + self.settings.progress_debounce);
                MonitorAction::None
            }
            ChannelEvent::ProfileStatusUpdate(update) => {
                self.pending_statuses.push(update.clone());
                let key = self.key(TimerClass::StatusBatch);
                self.timers
                    .schedule_if_idle(key, now + self.settings.status_batch_window);
                MonitorAction::None
            }
            ChannelEvent::BatchProcessing(batch) => {
                Arc::make_mut(&mut self.snapshot).current_batch = Some(CurrentBatch {
                    depth: batch.depth,
                    profiles: batch.current_batch.clone(),
                    processed_count: batch.processed_count,
                    total_count: batch.total_count,
                });
                MonitorAction::Updated
            }
            ChannelEvent::QueueStatusUpdate(queue) => {
                Arc::make_mut(&mut self.snapshot).queue_status = serde_json::to_value(queue).ok();
                MonitorAction::Updated
            }
            ChannelEvent::SessionStatusChanged(change) => {
                let snapshot = Arc::make_mut(&mut self.snapshot);
                match snapshot.session.as_mut() {
                    Some(session) if session.status != change.status => {
                        session.status = change.status;
                        MonitorAction::Updated
                    }
                    _ => MonitorAction::None,
                }
            }
            ChannelEvent::SessionDepthCompleted(completed) => {
                info!(
                    event = "core.monitor.depth_completed",
                    context = %self.context,
                    depth = ?completed.depth,
                );
                MonitorAction::Refetch
            }
            _ => MonitorAction::None,
        }
    }

    /// Fire expired timers. Returns true if the snapshot changed.
    pub fn poll_timers(&mut self, now: Instant) -> bool {
        let mut changed = false;
        for (_, class) in self.timers.take_expired(now) {
            match class {
                TimerClass::ProgressDebounce => changed |= self.flush_progress(),
                TimerClass::StatusBatch => changed |= self.flush_statuses(),
                _ => {}
            }
        }
        changed
    }

    fn flush_progress(&mut self) -> bool {
        let Some(progress) = self.pending_progress.take() else {
            return false;
        };
        let snapshot = Arc::make_mut(&mut self.snapshot);
        let Some(session) = snapshot.session.as_mut() else {
            return false;
        };
        if let Some(depth) = progress.current_depth {
            session.current_depth = Some(depth);
        }
        if let Some(total) = progress.total_profiles {
            session.total_profiles = Some(total);
        }
        if let Some(scraped) = progress.scraped_profiles {
            session.scraped_profiles = Some(scraped);
        }
        if let Some(value) = progress.progress {
            session.progress = Some(value);
        }
        if let Some(status) = progress.status {
            session.status = status;
        }
        true
    }

    fn flush_statuses(&mut self) -> bool {
        if self.pending_statuses.is_empty() {
            return false;
        }
        let batch = std::mem::take(&mut self.pending_statuses);
        let limit = self.settings.recent_limit;
        let snapshot = Arc::make_mut(&mut self.snapshot);

        for update in &batch {
            let Some(depth) = update.depth else {
                continue;
            };
            let Some(row) = snapshot.depth_stats.iter_mut().find(|s| s.depth == depth) else {
                continue;
            };
            match update.status {
                ItemStatus::Succeeded => {
                    row.scraped += 1;
                    row.pending = row.pending.saturating_sub(1);
                }
                ItemStatus::Failed => {
                    row.failed += 1;
                    row.pending = row.pending.saturating_sub(1);
                }
                _ => {}
            }
        }

        let mut recent: Vec<ProfileStatusUpdate> =
            batch.iter().rev().take(limit).cloned().collect();
        recent.extend(snapshot.recent_profiles.drain(..));
        recent.truncate(limit);
        snapshot.recent_profiles = recent;
        snapshot.recompute_progress();

        debug!(
            event = "core.monitor.status_batch_flushed",
            context = %self.context,
            updates = batch.len(),
        );
        true
    }

    /// Drop buffered events and cancel the outstanding fetch.
    pub fn dispose(&mut self) {
        self.tracker.cancel_all();
        self.timers.clear();
        self.pending_progress = None;
        self.pending_statuses.clear();
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.tracker.cancel_all();
    }
}

impl std::fmt::Debug for SessionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMonitor")
            .field("context", &self.context)
            .field("pending_statuses", &self.pending_statuses.len())
            .field("timers", &self.timers.len())
            .finish()
    }
}
