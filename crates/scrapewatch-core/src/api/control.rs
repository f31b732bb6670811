use scrapewatch_protocol::{CreateSessionRequest, SessionId, SessionRecord};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::SyncError;
use crate::notify::{NotificationDispatcher, NotificationKind};

use super::{ApiError, DashboardApi};

pub const RUNNING_DELETE_MESSAGE: &str = "Cannot delete a running session. Please stop it first.";

/// Result of creating a session.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub id: Option<SessionId>,
    /// Root profiles the backend already had stored.
    pub existing_profiles: u64,
    pub response: Value,
    /// Set when the session was created but queueing its first batch failed.
    pub start_error: Option<SyncError>,
}

impl CreatedSession {
    fn from_response(response: Value) -> Self {
        let id = ["/data/_id", "/data/id", "/_id", "/id"]
            .iter()
            .find_map(|pointer| response.pointer(pointer).and_then(Value::as_str))
            .map(SessionId::from);
        let existing_profiles = response
            .pointer("/profilesInfo/existing")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Self {
            id,
            existing_profiles,
            response,
            start_error: None,
        }
    }
}

/// Session lifecycle actions.
///
/// Failures come back as [`SyncError::ControlAction`]. Local state is never
/// updated optimistically; callers refetch after a successful action. When
/// a dispatcher is attached, each outcome is also announced there.
#[derive(Debug, Clone)]
pub struct SessionControl {
    api: DashboardApi,
    notifier: Option<NotificationDispatcher>,
}

impl SessionControl {
    pub fn new(api: DashboardApi) -> Self {
        Self {
            api,
            notifier: None,
        }
    }

    pub fn with_notifications(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.notifier = Some(dispatcher);
        self
    }

    fn announce(&self, kind: NotificationKind, title: &str, message: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(kind, title, Some(message));
        }
    }

    fn failed(&self, action: &str, title: &str, message: String) -> SyncError {
        warn!(event = "core.control.action_failed", action = action, message = %message);
        self.announce(NotificationKind::Error, title, &message);
        SyncError::ControlAction {
            action: action.to_string(),
            message,
        }
    }

    fn settle(
        &self,
        action: &str,
        failure_title: &str,
        result: Result<Value, ApiError>,
    ) -> Result<Value, SyncError> {
        result.map_err(|e| self.failed(action, failure_title, e.server_message().to_string()))
    }

    pub async fn pause(&self, session: &SessionRecord) -> Result<Value, SyncError> {
        let result = self.api.set_status(&session.id, "paused").await;
        let response = self.settle("pause", "Failed to Pause Session", result)?;
        info!(event = "core.control.pause_completed", session = %session.id);
        self.announce(
            NotificationKind::Success,
            "Session Paused",
            &format!("\"{}\" has been paused", session.name),
        );
        Ok(response)
    }

    pub async fn resume(&self, session: &SessionRecord) -> Result<Value, SyncError> {
        let result = self.api.set_status(&session.id, "running").await;
        let response = self.settle("resume", "Failed to Resume Session", result)?;
        info!(event = "core.control.resume_completed", session = %session.id);
        self.announce(
            NotificationKind::Success,
            "Session Resumed",
            &format!("\"{}\" is now running", session.name),
        );
        Ok(response)
    }

    pub async fn stop(&self, session: &SessionRecord) -> Result<Value, SyncError> {
        let result = self.api.stop_session(&session.id).await;
        let response = self.settle("stop", "Failed to Stop Session", result)?;
        info!(event = "core.control.stop_completed", session = %session.id);
        self.announce(
            NotificationKind::Info,
            "Session Stopped",
            &format!("\"{}\" has been stopped", session.name),
        );
        Ok(response)
    }

    /// Delete a session. Running sessions are refused without a request.
    pub async fn delete_session(&self, session: &SessionRecord) -> Result<Value, SyncError> {
        if session.status.is_running() {
            return Err(self.failed(
                "delete",
                "Failed to Delete Session",
                RUNNING_DELETE_MESSAGE.to_string(),
            ));
        }
        let result = self.api.delete_session(&session.id).await;
        let response = result.map_err(|e| {
            let message = match e {
                ApiError::Status {
                    message: Some(ref message),
                    ..
                } if !message.is_empty() => message.clone(),
                _ => RUNNING_DELETE_MESSAGE.to_string(),
            };
            self.failed("delete", "Failed to Delete Session", message)
        })?;
        info!(event = "core.control.delete_completed", session = %session.id);
        self.announce(
            NotificationKind::Success,
            "Session Deleted",
            &format!("\"{}\" has been deleted", session.name),
        );
        Ok(response)
    }

    /// Create a session and, when `start` is set, queue its first batch.
    ///
    /// A failed start does not fail the call: the session exists by then,
    /// so the error is carried on [`CreatedSession::start_error`].
    pub async fn create(
        &self,
        request: &CreateSessionRequest,
        start: bool,
    ) -> Result<CreatedSession, SyncError> {
        let result = self.api.create_session(request).await;
        let mut created = CreatedSession::from_response(self.settle(
            "create",
            "Failed to Create Session",
            result,
        )?);
        info!(
            event = "core.control.create_completed",
            session = ?created.id,
            existing_profiles = created.existing_profiles,
        );

        if start && let Some(id) = &created.id {
            let result = self.api.start_batch(id).await;
            created.start_error = self.settle("start", "Failed to Start Session", result).err();
        }
        Ok(created)
    }

    pub async fn start_batch(&self, id: &SessionId) -> Result<Value, SyncError> {
        let result = self.api.start_batch(id).await;
        self.settle("start", "Failed to Start Session", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapewatch_protocol::SessionStatus;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_created_session_id_lookup() {
        let nested = CreatedSession::from_response(json!({
            "data": { "_id": "s1" },
            "profilesInfo": { "existing": 2 }
        }));
        assert_eq!(nested.id, Some(SessionId::new("s1")));
        assert_eq!(nested.existing_profiles, 2);

        let flat = CreatedSession::from_response(json!({ "id": "s2" }));
        assert_eq!(flat.id, Some(SessionId::new("s2")));
        assert_eq!(flat.existing_profiles, 0);
    }

    #[tokio::test]
    async fn test_delete_running_session_is_refused_locally() {
        // Nothing listens on this port; a request would fail differently.
        let api = DashboardApi::new("http://127.0.0.1:9/api").unwrap();
        let dispatcher = NotificationDispatcher::default();
        let titles = Arc::new(Mutex::new(Vec::new()));
        let _listener = {
            let titles = titles.clone();
            dispatcher.subscribe(move |n: &crate::notify::Notification| {
                titles.lock().unwrap().push(n.title.clone())
            })
        };
        let control = SessionControl::new(api).with_notifications(dispatcher);

        let session = SessionRecord {
            id: SessionId::new("s1"),
            status: SessionStatus::Running,
            ..SessionRecord::default()
        };
        let err = control.delete_session(&session).await.unwrap_err();
        assert_eq!(
            err,
            SyncError::ControlAction {
                action: "delete".to_string(),
                message: RUNNING_DELETE_MESSAGE.to_string(),
            }
        );
        assert_eq!(*titles.lock().unwrap(), vec!["Failed to Delete Session".to_string()]);
    }
}
