//! Named events pushed over the event channel, and control messages sent back.
//!
//! Frames are JSON text: `{ "event": "<name>", "data": <payload> }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ItemStatus, SessionId, SessionStatus, Subject};

/// Event names, as used for handler registration.
pub mod names {
    pub const CONNECTION_STATUS: &str = "connection:status";
    pub const CONNECTION_ERROR: &str = "connection:error";
    pub const SESSION_PROGRESS: &str = "session:progress";
    pub const SESSION_STATUS_CHANGED: &str = "session:statusChanged";
    pub const SESSION_DEPTH_COMPLETED: &str = "session:depthCompleted";
    pub const PROFILE_SCRAPED: &str = "profile:scraped";
    pub const PROFILE_FAILED: &str = "profile:failed";
    pub const PROFILE_STATUS_UPDATE: &str = "profile:statusUpdate";
    pub const PROFILE_STATUS_BATCH: &str = "profile:statusBatch";
    pub const QUEUE_STATUS_UPDATE: &str = "queue:statusUpdate";
    pub const QUEUE_JOB_PROGRESS: &str = "queue:jobProgress";
    pub const BATCH_PROCESSING: &str = "batch:processing";
    pub const BATCH_COMPLETED: &str = "batch:completed";
    pub const SYSTEM_METRICS: &str = "system:metrics";
    pub const SYSTEM_ERROR: &str = "system:error";
    pub const SYSTEM_NOTIFICATION: &str = "system:notification";
    pub const ANALYSIS_PREFIX: &str = "analysis:";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionError {
    pub message: String,
    pub fatal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_profiles: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_profiles: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusChanged {
    pub session_id: SessionId,
    pub status: SessionStatus,
    #[serde(default, alias = "sessionName", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthCompleted {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

/// An item-level status transition.
///
/// Only `status` is guaranteed; every other field is applied only when the
/// backend sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStatusUpdate {
    #[serde(default)]
    pub session_id: SessionId,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ProfileStatusUpdate {
    pub fn natural_key(&self) -> Option<&str> {
        self.profile_url.as_deref().or(self.username.as_deref())
    }
}

/// Several status transitions for one session, delivered in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStatusBatch {
    pub session_id: SessionId,
    #[serde(default)]
    pub profiles: Vec<ProfileStatusUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileScraped {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<String>,
}

impl ProfileScraped {
    pub fn natural_key(&self) -> Option<&str> {
        self.profile_url.as_deref().or(self.username.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFailed {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProfileFailed {
    pub fn natural_key(&self) -> Option<&str> {
        self.profile_url.as_deref().or(self.username.as_deref())
    }
}

/// Counters for one backend job queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueStatus {
    #[serde(rename = "type")]
    pub queue_type: String,
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub paused: u64,
    pub delayed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessing {
    pub session_id: SessionId,
    #[serde(default)]
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub current_batch: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemHealth {
    pub mongodb: bool,
    pub redis: bool,
    pub api: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,
}

/// Partial system counters. Absent fields leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemMetrics {
    pub total_sessions: Option<u64>,
    pub active_sessions: Option<u64>,
    pub total_profiles: Option<u64>,
    pub processing_rate: Option<f64>,
    pub api_credits_used: Option<u64>,
    pub system_health: Option<SystemHealth>,
    pub queue_stats: Option<BTreeMap<String, QueueStatus>>,
}

/// Payload of `system:error` and `system:notification`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemMessage {
    pub message: Option<String>,
    pub error: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub session_id: Option<SessionId>,
}

impl SystemMessage {
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}

/// A decoded event-channel event.
///
/// `ConnectionStatus` and `ConnectionError` are synthesized locally by the
/// channel client; every other variant maps 1:1 to a backend event name.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    ConnectionStatus(ConnectionStatus),
    ConnectionError(ConnectionError),
    SessionProgress(SessionProgress),
    SessionStatusChanged(SessionStatusChanged),
    SessionDepthCompleted(DepthCompleted),
    ProfileScraped(ProfileScraped),
    ProfileFailed(ProfileFailed),
    ProfileStatusUpdate(ProfileStatusUpdate),
    QueueStatusUpdate(QueueStatus),
    QueueJobProgress(serde_json::Value),
    BatchProcessing(BatchProcessing),
    BatchCompleted(serde_json::Value),
    Analysis {
        name: String,
        data: serde_json::Value,
    },
    SystemMetrics(SystemMetrics),
    SystemError(SystemMessage),
    SystemNotification(SystemMessage),
    Unknown {
        name: String,
        data: serde_json::Value,
    },
}

impl ChannelEvent {
    /// The name handlers register under.
    pub fn name(&self) -> &str {
        match self {
            ChannelEvent::ConnectionStatus(_) => names::CONNECTION_STATUS,
            ChannelEvent::ConnectionError(_) => names::CONNECTION_ERROR,
            ChannelEvent::SessionProgress(_) => names::SESSION_PROGRESS,
            ChannelEvent::SessionStatusChanged(_) => names::SESSION_STATUS_CHANGED,
            ChannelEvent::SessionDepthCompleted(_) => names::SESSION_DEPTH_COMPLETED,
            ChannelEvent::ProfileScraped(_) => names::PROFILE_SCRAPED,
            ChannelEvent::ProfileFailed(_) => names::PROFILE_FAILED,
            ChannelEvent::ProfileStatusUpdate(_) => names::PROFILE_STATUS_UPDATE,
            ChannelEvent::QueueStatusUpdate(_) => names::QUEUE_STATUS_UPDATE,
            ChannelEvent::QueueJobProgress(_) => names::QUEUE_JOB_PROGRESS,
            ChannelEvent::BatchProcessing(_) => names::BATCH_PROCESSING,
            ChannelEvent::BatchCompleted(_) => names::BATCH_COMPLETED,
            ChannelEvent::Analysis { name, .. } => name,
            ChannelEvent::SystemMetrics(_) => names::SYSTEM_METRICS,
            ChannelEvent::SystemError(_) => names::SYSTEM_ERROR,
            ChannelEvent::SystemNotification(_) => names::SYSTEM_NOTIFICATION,
            ChannelEvent::Unknown { name, .. } => name,
        }
    }

    /// Session the event pertains to, when it is session-scoped.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            ChannelEvent::SessionProgress(e) => Some(&e.session_id),
            ChannelEvent::SessionStatusChanged(e) => Some(&e.session_id),
            ChannelEvent::SessionDepthCompleted(e) => Some(&e.session_id),
            ChannelEvent::ProfileScraped(e) => Some(&e.session_id),
            ChannelEvent::ProfileFailed(e) => Some(&e.session_id),
            ChannelEvent::ProfileStatusUpdate(e) => Some(&e.session_id),
            ChannelEvent::BatchProcessing(e) => Some(&e.session_id),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one text frame into local events.
///
/// A `profile:statusBatch` frame fans out into one `profile:statusUpdate`
/// per element, each stamped with the batch's session id. Every other frame
/// yields exactly one event.
pub fn parse_frame(text: &str) -> Result<Vec<ChannelEvent>, serde_json::Error> {
    let RawFrame { event, data } = serde_json::from_str(text)?;

    let decoded = match event.as_str() {
        names::SESSION_PROGRESS => ChannelEvent::SessionProgress(serde_json::from_value(data)?),
        names::SESSION_STATUS_CHANGED => {
            ChannelEvent::SessionStatusChanged(serde_json::from_value(data)?)
        }
        names::SESSION_DEPTH_COMPLETED => {
            ChannelEvent::SessionDepthCompleted(serde_json::from_value(data)?)
        }
        names::PROFILE_SCRAPED => ChannelEvent::ProfileScraped(serde_json::from_value(data)?),
        names::PROFILE_FAILED => ChannelEvent::ProfileFailed(serde_json::from_value(data)?),
        names::PROFILE_STATUS_UPDATE => {
            ChannelEvent::ProfileStatusUpdate(serde_json::from_value(data)?)
        }
        names::PROFILE_STATUS_BATCH => {
            let batch: ProfileStatusBatch = serde_json::from_value(data)?;
            let session_id = batch.session_id;
            return Ok(batch
                .profiles
                .into_iter()
                .map(|mut update| {
                    update.session_id = session_id.clone();
                    ChannelEvent::ProfileStatusUpdate(update)
                })
                .collect());
        }
        names::QUEUE_STATUS_UPDATE => ChannelEvent::QueueStatusUpdate(serde_json::from_value(data)?),
        names::QUEUE_JOB_PROGRESS => ChannelEvent::QueueJobProgress(data),
        names::BATCH_PROCESSING => ChannelEvent::BatchProcessing(serde_json::from_value(data)?),
        names::BATCH_COMPLETED => ChannelEvent::BatchCompleted(data),
        names::SYSTEM_METRICS => ChannelEvent::SystemMetrics(serde_json::from_value(data)?),
        names::SYSTEM_ERROR => ChannelEvent::SystemError(serde_json::from_value(data)?),
        names::SYSTEM_NOTIFICATION => {
            ChannelEvent::SystemNotification(serde_json::from_value(data)?)
        }
        name if name.starts_with(names::ANALYSIS_PREFIX) => ChannelEvent::Analysis { name: event, data },
        _ => ChannelEvent::Unknown { name: event, data },
    };

    Ok(vec![decoded])
}

/// Outbound control messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ControlMessage {
    #[serde(rename = "subscribe:session")]
    SubscribeSession(SessionId),
    #[serde(rename = "unsubscribe:session")]
    UnsubscribeSession(SessionId),
    #[serde(rename = "subscribe:system")]
    SubscribeSystem,
}

impl ControlMessage {
    /// The message that registers interest in `subject`.
    pub fn subscribe_to(subject: &Subject) -> Self {
        match subject {
            Subject::Session(id) => ControlMessage::SubscribeSession(id.clone()),
            Subject::System => ControlMessage::SubscribeSystem,
        }
    }

    /// The message that withdraws interest in `subject`. The backend has no
    /// system unsubscribe, so releasing `System` sends nothing.
    pub fn unsubscribe_from(subject: &Subject) -> Option<Self> {
        match subject {
            Subject::Session(id) => Some(ControlMessage::UnsubscribeSession(id.clone())),
            Subject::System => None,
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
