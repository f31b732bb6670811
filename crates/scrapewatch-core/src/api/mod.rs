//! REST client for the dashboard backend.
//!
//! Every response is decoded through the shape-tolerant parsers in
//! `scrapewatch-protocol`, so callers get canonical records regardless of
//! which backend generation answered.

mod control;
mod errors;

use std::collections::BTreeMap;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder};
use scrapewatch_config::ScrapewatchConfig;
use scrapewatch_protocol::{
    AnalysisStats, CreateSessionRequest, HealthStatus, MonitoringPayload, ProfileCategory,
    ProfilePage, QueueStatus, SessionId, SessionList, SessionRecord, SystemSnapshot,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::errors::SyncError;
use crate::list::{FilterSet, ProfileSource};
use crate::monitor::MonitoringSource;
use crate::system::SystemSource;

pub use control::{CreatedSession, RUNNING_DELETE_MESSAGE, SessionControl};
pub use errors::{ApiError, UNEXPECTED_ERROR};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to the dashboard REST API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DashboardApi {
    client: Client,
    base: Url,
    base_url: String,
}

impl DashboardApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let invalid = |message: String| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            message,
        };
        let base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path".to_string()));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Request {
                url: base_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ScrapewatchConfig) -> Result<Self, ApiError> {
        Self::new(config.api.base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint under the base path. Each segment is percent-encoded, so
    /// ids and queue names can never add path components.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl {
                url: self.base_url.clone(),
                message: "URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, url: String, request: RequestBuilder) -> Result<Value, ApiError> {
        debug!(event = "core.api.request_started", url = %url);
        let response = request.send().await.map_err(|e| ApiError::Request {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Request {
            url: url.clone(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let message = error_message(&body);
            let reason = status.canonical_reason().unwrap_or_default().to_string();
            warn!(
                event = "core.api.request_failed",
                url = %url,
                status = status.as_u16(),
                message = %message.as_deref().unwrap_or(&reason),
            );
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
                reason,
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            url,
            message: e.to_string(),
        })
    }

    async fn get(&self, url: &Url, query: &[(&'static str, String)]) -> Result<Value, ApiError> {
        let request = self.client.get(url.clone()).query(query);
        self.send(url.to_string(), request).await
    }

    async fn call(&self, method: Method, url: &Url, body: Option<Value>) -> Result<Value, ApiError> {
        let mut request = self.client.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.send(url.to_string(), request).await
    }

    fn decode<T: DeserializeOwned>(&self, url: &Url, value: Value) -> Result<T, ApiError> {
        serde_json::from_value(value).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// One page of profiles, scoped to `session` when given.
    pub async fn list_profiles(
        &self,
        session: Option<&SessionId>,
        filter: &FilterSet,
    ) -> Result<ProfilePage, ApiError> {
        let url = match session {
            Some(id) => self.endpoint(&["dashboard", "session", id.as_str(), "profiles"])?,
            None => self.endpoint(&["dashboard", "profiles"])?,
        };
        let value = self.get(&url, &profile_query(filter)).await?;
        ProfilePage::from_value(value, filter.limit).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn session_monitoring(&self, id: &SessionId) -> Result<MonitoringPayload, ApiError> {
        let url = self.endpoint(&["dashboard", "session", id.as_str()])?;
        let value = self.get(&url, &[]).await?;
        MonitoringPayload::from_value(value).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>, ApiError> {
        let url = self.endpoint(&["sessions"])?;
        let value = self.get(&url, &[]).await?;
        let list: SessionList = self.decode(&url, value)?;
        Ok(list.into_sessions())
    }

    pub async fn dashboard_sessions(&self) -> Result<Vec<SessionRecord>, ApiError> {
        let url = self.endpoint(&["dashboard", "sessions"])?;
        let value = self.get(&url, &[]).await?;
        let list: SessionList = self.decode(&url, value)?;
        Ok(list.into_sessions())
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<SessionRecord, ApiError> {
        let url = self.endpoint(&["sessions", id.as_str()])?;
        let value = self.get(&url, &[]).await?;
        self.decode(&url, unwrap_data(value))
    }

    pub async fn system_snapshot(&self) -> Result<SystemSnapshot, ApiError> {
        let url = self.endpoint(&["dashboard", "system"])?;
        let value = self.get(&url, &[]).await?;
        self.decode(&url, unwrap_data(value))
    }

    pub async fn queue_status(&self) -> Result<BTreeMap<String, QueueStatus>, ApiError> {
        let url = self.endpoint(&["queues", "status"])?;
        let value = self.get(&url, &[]).await?;
        decode_queues(unwrap_data(value)).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn clean_queue(&self, name: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(&["queues", name, "clean"])?;
        self.call(Method::POST, &url, None).await
    }

    pub async fn scraper_status(&self, id: &SessionId) -> Result<Value, ApiError> {
        let url = self.endpoint(&["scraper", "status", id.as_str()])?;
        self.get(&url, &[]).await
    }

    /// Backend liveness. Any failure reads as offline rather than an error.
    pub async fn health(&self) -> HealthStatus {
        let result = match self.endpoint(&["health"]) {
            Ok(url) => self.get(&url, &[]).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(value) => HealthStatus::Online {
                status: value
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("ok")
                    .to_string(),
            },
            Err(e) => {
                debug!(event = "core.api.health_failed", error = %e);
                HealthStatus::Offline
            }
        }
    }

    /// Analysis progress, from the current endpoint or the legacy one when
    /// the current endpoint does not exist.
    pub async fn analysis_stats(&self, id: &SessionId) -> Result<AnalysisStats, ApiError> {
        let current = self.endpoint(&["analysis", "n8n", "session-stats", id.as_str()])?;
        let (url, value) = match self.get(&current, &[]).await {
            Ok(value) => (current, value),
            Err(e) if e.is_not_found() => {
                let legacy = self.endpoint(&["analysis", "status", id.as_str()])?;
                let value = self.get(&legacy, &[]).await?;
                (legacy, value)
            }
            Err(e) => return Err(e),
        };
        self.decode(&url, unwrap_data(value))
    }

    pub async fn set_status(&self, id: &SessionId, status: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(&["sessions", id.as_str(), "status"])?;
        self.call(
            Method::PUT,
            &url,
            Some(serde_json::json!({ "status": status })),
        )
        .await
    }

    pub async fn stop_session(&self, id: &SessionId) -> Result<Value, ApiError> {
        let url = self.endpoint(&["sessions", id.as_str(), "stop"])?;
        self.call(Method::POST, &url, None).await
    }

    pub async fn delete_session(&self, id: &SessionId) -> Result<Value, ApiError> {
        let url = self.endpoint(&["sessions", id.as_str()])?;
        self.call(Method::DELETE, &url, None).await
    }

    pub async fn create_session(&self, request: &CreateSessionRequest) -> Result<Value, ApiError> {
        let url = self.endpoint(&["sessions"])?;
        let body = serde_json::to_value(request).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.call(Method::POST, &url, Some(body)).await
    }

    pub async fn start_batch(&self, id: &SessionId) -> Result<Value, ApiError> {
        let url = self.endpoint(&["sessions", id.as_str(), "queue-process"])?;
        self.call(Method::POST, &url, None).await
    }
}

impl ProfileSource for DashboardApi {
    fn fetch_page(
        &self,
        session: Option<&SessionId>,
        filter: &FilterSet,
    ) -> BoxFuture<'static, Result<ProfilePage, SyncError>> {
        let api = self.clone();
        let session = session.cloned();
        let filter = filter.clone();
        async move {
            api.list_profiles(session.as_ref(), &filter)
                .await
                .map_err(SyncError::from)
        }
        .boxed()
    }
}

impl MonitoringSource for DashboardApi {
    fn fetch_monitoring(
        &self,
        session: &SessionId,
    ) -> BoxFuture<'static, Result<MonitoringPayload, SyncError>> {
        let api = self.clone();
        let session = session.clone();
        async move {
            api.session_monitoring(&session)
                .await
                .map_err(SyncError::from)
        }
        .boxed()
    }
}

impl SystemSource for DashboardApi {
    fn fetch_system(&self) -> BoxFuture<'static, Result<SystemSnapshot, SyncError>> {
        let api = self.clone();
        async move { api.system_snapshot().await.map_err(SyncError::from) }.boxed()
    }
}

/// Query parameters for a profile listing. `page` goes out 1-based, with
/// the equivalent `offset` for backends that page by offset.
pub fn profile_query(filter: &FilterSet) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if filter.category != ProfileCategory::All {
        query.push(("type", filter.category.as_str().to_string()));
    }
    if let Some(depth) = filter.depth {
        query.push(("depth", depth.to_string()));
    }
    if let Some(status) = filter.status {
        query.push(("status", status.as_wire_str().to_string()));
    }
    if filter.has_search() {
        query.push(("search", filter.search.trim().to_string()));
    }
    query.push(("page", (filter.page + 1).to_string()));
    query.push((
        "offset",
        (u64::from(filter.page) * u64::from(filter.limit)).to_string(),
    ));
    query.push(("limit", filter.limit.to_string()));
    query.push(("sortBy", filter.sort_by.clone()));
    query.push(("sortOrder", filter.sort_order.as_str().to_string()));
    query
}

/// Strip a `{ "data": { ... } }` envelope if present.
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

/// Queue counters arrive keyed by queue name or as an array of entries
/// carrying their own `type`.
fn decode_queues(value: Value) -> Result<BTreeMap<String, QueueStatus>, serde_json::Error> {
    match value {
        Value::Array(_) => {
            let entries: Vec<QueueStatus> = serde_json::from_value(value)?;
            Ok(entries
                .into_iter()
                .map(|entry| (entry.queue_type.clone(), entry))
                .collect())
        }
        Value::Null => Ok(BTreeMap::new()),
        other => {
            let mut queues: BTreeMap<String, QueueStatus> = serde_json::from_value(other)?;
            for (name, queue) in queues.iter_mut() {
                if queue.queue_type.is_empty() {
                    queue.queue_type = name.clone();
                }
            }
            Ok(queues)
        }
    }
}

/// Pull the backend's message out of a JSON error body: `error.message`,
/// then `error`, then `message`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    [
        value.pointer("/error/message"),
        value.get("error"),
        value.get("message"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .find(|s| !s.is_empty())
    .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapewatch_protocol::{ItemStatus, SortOrder};
    use serde_json::json;

    fn query_value<'a>(query: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        query
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_profile_query_is_one_based() {
        let filter = FilterSet {
            category: ProfileCategory::Related,
            depth: Some(2),
            status: Some(ItemStatus::Failed),
            search: "  alice ".to_string(),
            page: 2,
            limit: 20,
            sort_by: "username".to_string(),
            sort_order: SortOrder::Asc,
        };
        let query = profile_query(&filter);
        assert_eq!(query_value(&query, "type"), Some("related"));
        assert_eq!(query_value(&query, "depth"), Some("2"));
        assert_eq!(query_value(&query, "status"), Some("failed"));
        assert_eq!(query_value(&query, "search"), Some("alice"));
        assert_eq!(query_value(&query, "page"), Some("3"));
        assert_eq!(query_value(&query, "offset"), Some("40"));
        assert_eq!(query_value(&query, "sortOrder"), Some("asc"));
    }

    #[test]
    fn test_profile_query_omits_unset_filters() {
        let query = profile_query(&FilterSet::default());
        assert_eq!(query_value(&query, "type"), None);
        assert_eq!(query_value(&query, "depth"), None);
        assert_eq!(query_value(&query, "search"), None);
        assert_eq!(query_value(&query, "page"), Some("1"));
        assert_eq!(query_value(&query, "sortBy"), Some("createdAt"));
    }

    #[test]
    fn test_unwrap_data() {
        assert_eq!(unwrap_data(json!({ "data": { "a": 1 } })), json!({ "a": 1 }));
        assert_eq!(unwrap_data(json!({ "data": [1] })), json!({ "data": [1] }));
        assert_eq!(unwrap_data(json!({ "a": 1 })), json!({ "a": 1 }));
    }

    #[test]
    fn test_decode_queues_accepts_both_shapes() {
        let keyed = decode_queues(json!({ "profile-scraping": { "waiting": 3 } })).unwrap();
        assert_eq!(keyed["profile-scraping"].waiting, 3);
        assert_eq!(keyed["profile-scraping"].queue_type, "profile-scraping");

        let listed = decode_queues(json!([ { "type": "depth", "active": 1 } ])).unwrap();
        assert_eq!(listed["depth"].active, 1);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":"Session not found"}"#).as_deref(),
            Some("Session not found")
        );
        assert_eq!(error_message(r#"{"message":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn test_error_message_reads_nested_error_object() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Session is locked"}}"#).as_deref(),
            Some("Session is locked")
        );
        assert_eq!(
            error_message(r#"{"error":{"code":7},"message":"fallback"}"#).as_deref(),
            Some("fallback")
        );
        assert_eq!(error_message(r#"{"error":"","message":""}"#), None);
    }

    #[test]
    fn test_endpoint_segments_are_encoded() {
        let api = DashboardApi::new("http://localhost:5000/api/").unwrap();
        let url = api.endpoint(&["sessions", "a/b c", "status"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/sessions/a%2Fb%20c/status");

        let bare = DashboardApi::new("http://localhost:5000").unwrap();
        assert_eq!(
            bare.endpoint(&["health"]).unwrap().as_str(),
            "http://localhost:5000/health"
        );
    }

    #[test]
    fn test_rejects_base_url_without_path() {
        assert!(matches!(
            DashboardApi::new("mailto:ops@example.com"),
            Err(ApiError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            DashboardApi::new("not a url"),
            Err(ApiError::InvalidBaseUrl { .. })
        ));
        let api = DashboardApi::new("http://localhost:5000/api/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:5000/api");
    }
}
