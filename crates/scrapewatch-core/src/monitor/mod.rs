//! Per-session monitoring roll-ups.
//!
//! A [`MonitoringSnapshot`] is built once from the monitoring endpoint by
//! [`normalize`], then kept current by [`SessionMonitor`] as channel events
//! arrive. [`MonitorSync`] runs the aggregator on its own task.

mod aggregator;
mod normalize;
mod progress;
mod sync;

use scrapewatch_protocol::{CurrentBatch, DepthStats, ProfileStatusUpdate, SessionRecord};

use crate::errors::SyncError;

pub use aggregator::{MonitorSettings, SessionMonitor};
pub use normalize::{format_eta, normalize, normalize_metrics};
pub use progress::{depth_progress, overall_progress};
pub use sync::{MonitorSync, MonitoringSource};

/// Processing rates in display units.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingMetrics {
    pub processing_rate: f64,
    pub average_time_per_profile: f64,
    /// `"{m}m {s}s"`, or `"Calculating..."` while unknown.
    pub estimated_time_remaining: String,
    pub api_credits_used: u64,
    pub success_rate: f64,
}

impl Default for ProcessingMetrics {
    fn default() -> Self {
        Self {
            processing_rate: 0.0,
            average_time_per_profile: 0.0,
            estimated_time_remaining: normalize::CALCULATING.to_string(),
            api_credits_used: 0,
            success_rate: 100.0,
        }
    }
}

/// Canonical monitoring state for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitoringSnapshot {
    pub session: Option<SessionRecord>,
    /// One row per depth, sorted by depth.
    pub depth_stats: Vec<DepthStats>,
    pub current_batch: Option<CurrentBatch>,
    pub processing_metrics: ProcessingMetrics,
    /// Newest first.
    pub recent_profiles: Vec<ProfileStatusUpdate>,
    pub queue_status: Option<serde_json::Value>,
    /// Integer percent, 0..=100.
    pub overall_progress: u32,
    pub loading: bool,
    pub error: Option<SyncError>,
}

impl MonitoringSnapshot {
    pub fn depth(&self, depth: u32) -> Option<&DepthStats> {
        self.depth_stats.iter().find(|s| s.depth == depth)
    }

    /// Highest depth that counts toward overall progress.
    pub fn max_depth(&self) -> u32 {
        match &self.session {
            Some(session) => session.max_depth(),
            None => self.depth_stats.iter().map(|s| s.depth).max().unwrap_or(0),
        }
    }

    pub(crate) fn recompute_progress(&mut self) {
        let overall = overall_progress(&self.depth_stats, self.max_depth());
        self.overall_progress = overall;
        if let Some(session) = self.session.as_mut() {
            session.progress_percentage = Some(f64::from(overall));
        }
    }
}

/// What the caller should do after feeding an event to an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// Nothing visible changed yet.
    None,
    Updated,
    /// The snapshot is out of date; fetch a new one.
    Refetch,
}
