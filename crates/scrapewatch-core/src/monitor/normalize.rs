//! The single ingestion point for monitoring payloads.
//!
//! Whatever layout the backend sent, [`normalize`] produces one
//! [`MonitoringSnapshot`]; nothing downstream looks at payload shape again.

use scrapewatch_protocol::{
    DepthLayout, DepthStats, EtaField, ModernDepthLayout, MonitoringPayload, RawProcessingMetrics,
    StatusCount,
};

use super::{MonitoringSnapshot, ProcessingMetrics};

pub(crate) const CALCULATING: &str = "Calculating...";

/// Build a canonical snapshot from a monitoring response.
pub fn normalize(payload: MonitoringPayload) -> MonitoringSnapshot {
    let mut depth_stats = match payload.layout {
        DepthLayout::Modern(modern) => join_modern(modern),
        DepthLayout::Legacy(legacy) => legacy.depth_stats,
    };
    depth_stats.sort_by_key(|s| s.depth);

    let mut snapshot = MonitoringSnapshot {
        session: payload.session,
        depth_stats,
        current_batch: payload.current_batch,
        processing_metrics: normalize_metrics(payload.processing_metrics),
        recent_profiles: payload.recent_profiles,
        queue_status: payload.queue_status,
        ..MonitoringSnapshot::default()
    };
    snapshot.recompute_progress();
    snapshot
}

#[derive(Default)]
struct Counts {
    scraped: u64,
    failed: u64,
    pending: u64,
}

impl Counts {
    fn add(&mut self, status: &str, count: u64) {
        match status {
            "scraped" => self.scraped += count,
            "failed" => self.failed += count,
            "pending" => self.pending += count,
            _ => {}
        }
    }

    fn from_breakdown(breakdown: &[StatusCount]) -> Self {
        let mut counts = Self::default();
        for entry in breakdown {
            counts.add(&entry.status, entry.count);
        }
        counts
    }
}

/// Join the modern layout's per-depth arrays into one row per depth.
fn join_modern(layout: ModernDepthLayout) -> Vec<DepthStats> {
    let in_queue = |depth: u32| {
        layout
            .queue_stats_by_depth
            .iter()
            .find(|q| q.depth == depth)
            .map_or(0, |q| q.in_queue)
    };

    let mut stats: Vec<DepthStats> = layout
        .related_profile_stats
        .iter()
        .map(|related| {
            let counts = Counts::from_breakdown(&related.status_breakdown);
            let reuse = layout
                .profile_reuse_stats
                .iter()
                .find(|r| r.depth == Some(related.depth));
            let existing = reuse.map_or(0, |r| r.existing_profiles);
            DepthStats {
                depth: related.depth,
                total: related.total,
                scraped: counts.scraped,
                failed: counts.failed,
                pending: counts.pending,
                in_queue: in_queue(related.depth),
                from_database: existing,
                need_to_scrape: counts.pending,
                total_related_profiles_found: related.total_related_profiles_found,
                existing_profiles: existing,
                actually_scraped: reuse
                    .and_then(|r| r.scraped_profiles)
                    .unwrap_or(counts.scraped),
                ..DepthStats::default()
            }
        })
        .collect();

    let has_root_row = stats.iter().any(|s| s.depth == 0);
    if !layout.root_profile_stats.is_empty() && !has_root_row {
        let mut counts = Counts::default();
        let mut related_found = 0;
        for entry in &layout.root_profile_stats {
            counts.add(&entry.status, entry.count);
            related_found += entry.total_related_profiles_found;
        }
        let reuse = layout.root_profile_reuse_stats.first();
        let existing = reuse.map_or(0, |r| r.existing_profiles);
        stats.push(DepthStats {
            depth: 0,
            total: counts.scraped + counts.failed + counts.pending,
            scraped: counts.scraped,
            failed: counts.failed,
            pending: counts.pending,
            in_queue: in_queue(0),
            from_database: existing,
            need_to_scrape: counts.pending,
            total_related_profiles_found: related_found,
            existing_profiles: existing,
            actually_scraped: reuse
                .and_then(|r| r.scraped_profiles)
                .unwrap_or(counts.scraped),
            ..DepthStats::default()
        });
    }

    if let Some(report) = &layout.depth_progress {
        for detail in &report.depth_details {
            if let Some(row) = stats.iter_mut().find(|s| s.depth == detail.depth) {
                row.analyzed_profiles = detail.analyzed_profiles;
                row.pending_analysis = detail.pending_analysis;
                row.is_scraping_complete = detail.is_scraping_complete;
                row.is_analysis_complete = detail.is_analysis_complete;
                row.is_fully_complete = detail.is_fully_complete;
            }
        }
    }

    stats
}

/// `"{m}m {s}s"` for a positive number of seconds.
pub fn format_eta(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let whole = seconds.floor() as u64;
    Some(format!("{}m {}s", whole / 60, whole % 60))
}

pub fn normalize_metrics(raw: Option<RawProcessingMetrics>) -> ProcessingMetrics {
    let Some(raw) = raw else {
        return ProcessingMetrics::default();
    };
    let eta = match raw.estimated_time_remaining {
        Some(EtaField::Seconds(seconds)) => format_eta(seconds),
        Some(EtaField::Text(text)) if !text.trim().is_empty() => Some(text),
        _ => None,
    };
    ProcessingMetrics {
        processing_rate: raw.processing_rate.unwrap_or(0.0),
        average_time_per_profile: raw
            .avg_processing_time
            .or(raw.average_time_per_profile)
            .unwrap_or(0.0),
        estimated_time_remaining: eta.unwrap_or_else(|| CALCULATING.to_string()),
        api_credits_used: raw.total_processed.or(raw.api_credits_used).unwrap_or(0),
        success_rate: raw.success_rate.unwrap_or(100.0),
    }
}
