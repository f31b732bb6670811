use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::{QueueStatus, SystemHealth};
use crate::types::{ItemStatus, SessionId, SessionStatus};

/// One profile row as returned by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ProfileRecord {
    /// Key used to correlate this row with channel events, which do not
    /// carry the backend `_id`.
    pub fn natural_key(&self) -> Option<&str> {
        self.profile_url.as_deref().or(self.username.as_deref())
    }
}

/// A page of profiles with normalized pagination.
///
/// `page` is 1-based, as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePage {
    pub profiles: Vec<ProfileRecord>,
    pub total_count: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub has_more: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageEnvelope {
    Wrapped { data: RawPage },
    Bare(RawPage),
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawPage {
    #[serde(default)]
    profiles: Option<Vec<ProfileRecord>>,
    #[serde(default)]
    items: Option<Vec<ProfileRecord>>,
    #[serde(default)]
    pagination: Option<RawPagination>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawPagination {
    total_count: Option<u64>,
    total: Option<u64>,
    page: Option<u32>,
    offset: Option<u64>,
    limit: Option<u32>,
    total_pages: Option<u32>,
    pages: Option<u32>,
    has_more: Option<bool>,
}

impl ProfilePage {
    /// Parse a list response body.
    ///
    /// Accepts the body wrapped in `{ "data": ... }` or bare, rows under
    /// `profiles` or `items`, and either naming of each pagination field.
    /// `requested_limit` fills in a missing `limit`.
    pub fn from_value(
        value: serde_json::Value,
        requested_limit: u32,
    ) -> Result<Self, serde_json::Error> {
        let raw = match serde_json::from_value::<PageEnvelope>(value)? {
            PageEnvelope::Wrapped { data } => data,
            PageEnvelope::Bare(page) => page,
        };

        let profiles = raw.profiles.or(raw.items).unwrap_or_default();
        let pagination = raw.pagination.unwrap_or_default();

        let total_count = pagination
            .total_count
            .or(pagination.total)
            .unwrap_or(profiles.len() as u64);
        let limit = pagination.limit.unwrap_or(requested_limit).max(1);
        let page = pagination
            .page
            .or_else(|| {
                pagination
                    .offset
                    .map(|offset| (offset / u64::from(limit)) as u32 + 1)
            })
            .unwrap_or(1);
        let total_pages = pagination
            .total_pages
            .or(pagination.pages)
            .unwrap_or_else(|| total_count.div_ceil(u64::from(limit)) as u32);
        let has_more = pagination.has_more.unwrap_or(page < total_pages);

        Ok(Self {
            profiles,
            total_count,
            page,
            limit,
            total_pages,
            has_more,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_profiles_per_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_enabled: Option<bool>,
}

/// A scraping session as reported by the backend.
///
/// The progress fields are patched in place by `session:progress` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: SessionId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub root_profiles: Vec<String>,
    #[serde(default)]
    pub config: SessionConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_profiles: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_profiles: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
}

impl SessionRecord {
    pub fn max_depth(&self) -> u32 {
        self.config.max_depth.unwrap_or(0)
    }
}

/// Session listing envelope: `{data: [...]}`, `{sessions: [...]}` or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SessionList {
    Data { data: Vec<SessionRecord> },
    Sessions { sessions: Vec<SessionRecord> },
    Bare(Vec<SessionRecord>),
}

impl SessionList {
    pub fn into_sessions(self) -> Vec<SessionRecord> {
        match self {
            SessionList::Data { data } => data,
            SessionList::Sessions { sessions } => sessions,
            SessionList::Bare(sessions) => sessions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionConfig {
    pub max_depth: u32,
    /// `None` serializes as `null`, which the backend reads as unlimited.
    pub max_profiles_per_depth: Option<u32>,
    pub analysis_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub root_profiles: Vec<String>,
    pub config: CreateSessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// System-wide analytics from `/dashboard/system`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSnapshot {
    pub total_sessions: u64,
    pub active_sessions: u64,
    pub completed_sessions: u64,
    pub failed_sessions: u64,
    pub total_profiles_scraped: u64,
    pub processing_rate: f64,
    pub system_health: Option<SystemHealth>,
    pub queue_stats: BTreeMap<String, QueueStatus>,
    pub recent_activity: Vec<ActivityEntry>,
}

/// Analysis progress for one session.
///
/// Both the current and the legacy analysis endpoints decode into this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisStats {
    pub total_analyzed: u64,
    pub total_pending_analysis: u64,
    pub total_stored: u64,
    pub total_skipped: u64,
    pub percent_complete: f64,
    pub pending_profiles: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Online { status: String },
    Offline,
}

impl HealthStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, HealthStatus::Online { .. })
    }
}
