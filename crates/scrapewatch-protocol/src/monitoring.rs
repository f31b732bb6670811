//! Raw payload of the session monitoring endpoint.
//!
//! Two backend generations report per-depth statistics differently. The
//! modern layout sends raw status breakdowns plus separate queue/reuse
//! arrays keyed by depth; the legacy layout sends pre-shaped `depthStats`.
//! [`DepthLayout`] captures whichever is present; canonicalization lives
//! in the consumer.

use serde::{Deserialize, Serialize};

use crate::events::ProfileStatusUpdate;
use crate::records::SessionRecord;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringPayload {
    #[serde(default)]
    pub session: Option<SessionRecord>,
    #[serde(flatten)]
    pub layout: DepthLayout,
    #[serde(default)]
    pub processing_metrics: Option<RawProcessingMetrics>,
    #[serde(default)]
    pub current_batch: Option<CurrentBatch>,
    #[serde(default)]
    pub recent_profiles: Vec<ProfileStatusUpdate>,
    #[serde(default)]
    pub queue_status: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MonitoringEnvelope {
    Wrapped { data: Box<MonitoringPayload> },
    Bare(Box<MonitoringPayload>),
}

impl MonitoringPayload {
    /// Parse a monitoring response body, wrapped in `{ "data": ... }` or bare.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        match serde_json::from_value::<MonitoringEnvelope>(value)? {
            MonitoringEnvelope::Wrapped { data } => Ok(*data),
            MonitoringEnvelope::Bare(payload) => Ok(*payload),
        }
    }
}

/// Per-depth statistics in either backend layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DepthLayout {
    Modern(ModernDepthLayout),
    Legacy(LegacyDepthLayout),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModernDepthLayout {
    pub related_profile_stats: Vec<RelatedDepthStat>,
    #[serde(default)]
    pub queue_stats_by_depth: Vec<QueueDepthStat>,
    #[serde(default)]
    pub profile_reuse_stats: Vec<ReuseStat>,
    #[serde(default)]
    pub root_profile_stats: Vec<RootStatusCount>,
    #[serde(default)]
    pub root_profile_reuse_stats: Vec<ReuseStat>,
    #[serde(default)]
    pub depth_progress: Option<DepthProgressReport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDepthLayout {
    #[serde(default)]
    pub depth_stats: Vec<DepthStats>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedDepthStat {
    #[serde(rename = "_id")]
    pub depth: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub status_breakdown: Vec<StatusCount>,
    #[serde(default)]
    pub total_related_profiles_found: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusCount {
    pub status: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDepthStat {
    pub depth: u32,
    #[serde(default)]
    pub in_queue: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuseStat {
    #[serde(rename = "_id", default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub existing_profiles: u64,
    #[serde(default)]
    pub scraped_profiles: Option<u64>,
}

/// Root-level status count: `_id` is the status name, not a depth.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootStatusCount {
    #[serde(rename = "_id")]
    pub status: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub total_related_profiles_found: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthProgressReport {
    #[serde(default)]
    pub depth_details: Vec<DepthDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepthDetail {
    pub depth: u32,
    pub analyzed_profiles: u64,
    pub pending_analysis: u64,
    pub is_scraping_complete: bool,
    pub is_analysis_complete: bool,
    pub is_fully_complete: bool,
}

/// Canonical statistics for one crawl depth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepthStats {
    pub depth: u32,
    pub total: u64,
    pub scraped: u64,
    pub failed: u64,
    pub pending: u64,
    pub in_queue: u64,
    pub from_database: u64,
    pub need_to_scrape: u64,
    pub total_related_profiles_found: u64,
    pub existing_profiles: u64,
    pub actually_scraped: u64,
    pub analyzed_profiles: u64,
    pub pending_analysis: u64,
    pub is_scraping_complete: bool,
    pub is_analysis_complete: bool,
    pub is_fully_complete: bool,
}

/// Estimated time remaining: seconds from the modern backend, preformatted
/// text from the legacy one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EtaField {
    Seconds(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawProcessingMetrics {
    pub processing_rate: Option<f64>,
    pub avg_processing_time: Option<f64>,
    pub average_time_per_profile: Option<f64>,
    pub estimated_time_remaining: Option<EtaField>,
    pub total_processed: Option<u64>,
    pub api_credits_used: Option<u64>,
    pub success_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentBatch {
    pub depth: u32,
    pub profiles: Vec<String>,
    pub processed_count: u64,
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_modern_layout_selected_when_related_stats_present() {
        let payload = MonitoringPayload::from_value(json!({
            "data": {
                "session": { "_id": "s1", "config": { "maxDepth": 1 } },
                "relatedProfileStats": [
                    { "_id": 1, "total": 5, "statusBreakdown": [ { "status": "scraped", "count": 5 } ] }
                ],
                "rootProfileStats": [ { "_id": "scraped", "count": 10 } ],
                "processingMetrics": { "processingRate": 2.5, "estimatedTimeRemaining": 125 }
            }
        }))
        .unwrap();

        match &payload.layout {
            DepthLayout::Modern(modern) => {
                assert_eq!(modern.related_profile_stats[0].depth, 1);
                assert_eq!(modern.root_profile_stats[0].status, "scraped");
            }
            DepthLayout::Legacy(_) => panic!("expected modern layout"),
        }
        let metrics = payload.processing_metrics.unwrap();
        assert_eq!(metrics.estimated_time_remaining, Some(EtaField::Seconds(125.0)));
    }

    #[test]
    fn test_legacy_layout_selected_otherwise() {
        let payload = MonitoringPayload::from_value(json!({
            "session": { "_id": "s1" },
            "depthStats": [ { "depth": 0, "total": 3, "scraped": 1 } ],
            "processingMetrics": { "estimatedTimeRemaining": "4m 2s" }
        }))
        .unwrap();

        match &payload.layout {
            DepthLayout::Legacy(legacy) => {
                assert_eq!(legacy.depth_stats.len(), 1);
                assert_eq!(legacy.depth_stats[0].scraped, 1);
            }
            DepthLayout::Modern(_) => panic!("expected legacy layout"),
        }
    }
}
