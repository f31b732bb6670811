//! Wire types shared by the scrapewatch client crates.
//!
//! Covers the REST envelopes returned by the dashboard API, the named
//! events pushed over the event channel, and the control messages sent back.
//! Shape tolerance (legacy vs. modern layouts, alternate pagination fields)
//! is resolved here so nothing downstream branches on payload shape.

mod events;
mod monitoring;
mod records;
mod types;

pub use events::{
    BatchProcessing, ChannelEvent, ConnectionError, ConnectionStatus, ControlMessage,
    DepthCompleted, ProfileFailed, ProfileScraped, ProfileStatusBatch, ProfileStatusUpdate,
    QueueStatus, SessionProgress, SessionStatusChanged, SystemHealth, SystemMessage,
    SystemMetrics, names, parse_frame,
};
pub use monitoring::{
    CurrentBatch, DepthDetail, DepthLayout, DepthProgressReport, DepthStats, EtaField,
    LegacyDepthLayout, ModernDepthLayout, MonitoringPayload, QueueDepthStat,
    RawProcessingMetrics, RelatedDepthStat, ReuseStat, RootStatusCount, StatusCount,
};
pub use records::{
    ActivityEntry, AnalysisStats, CreateSessionConfig, CreateSessionRequest, HealthStatus,
    ProfilePage, ProfileRecord, SessionConfig, SessionList, SessionRecord, SystemSnapshot,
};
pub use types::{ItemStatus, ProfileCategory, SessionId, SessionStatus, SortOrder, Subject};
