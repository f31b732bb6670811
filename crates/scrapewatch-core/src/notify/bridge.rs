//! User-facing notifications for channel events.

use scrapewatch_protocol::{ChannelEvent, SessionStatus, names};

use crate::channel::{ChannelClient, Subscription};

use super::{NotificationDispatcher, NotificationKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
}

impl NotificationDraft {
    fn new(kind: NotificationKind, title: &str, message: Option<String>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            message,
        }
    }
}

/// The notification an event warrants, if any.
pub fn notification_for(event: &ChannelEvent) -> Option<NotificationDraft> {
    let draft = match event {
        ChannelEvent::ConnectionStatus(status) if status.connected => NotificationDraft::new(
            NotificationKind::Success,
            "Connected",
            Some("Real-time updates enabled".to_string()),
        ),
        ChannelEvent::ConnectionStatus(status) => {
            let reason = status.reason.clone()?;
            NotificationDraft::new(NotificationKind::Error, "Disconnected", Some(reason))
        }
        ChannelEvent::ConnectionError(error) if error.fatal => NotificationDraft::new(
            NotificationKind::Error,
            "Offline",
            Some("Manual reconnect required".to_string()),
        ),
        ChannelEvent::SystemError(message) => {
            let text = message
                .error
                .as_deref()
                .or(message.message.as_deref())
                .unwrap_or("An unexpected error occurred");
            NotificationDraft::new(NotificationKind::Error, "System Error", Some(text.to_string()))
        }
        ChannelEvent::ProfileFailed(failed) => {
            let who = failed.natural_key().unwrap_or("unknown");
            let why = failed.error.as_deref().unwrap_or("Unknown error");
            NotificationDraft::new(
                NotificationKind::Warning,
                "Profile Scraping Failed",
                Some(format!("Failed to scrape @{}: {}", who, why)),
            )
        }
        ChannelEvent::SessionStatusChanged(change) => {
            let (kind, title) = match change.status {
                SessionStatus::Completed => (NotificationKind::Success, "Session Completed"),
                SessionStatus::Failed => (NotificationKind::Error, "Session Failed"),
                SessionStatus::Stopped => (NotificationKind::Info, "Session Stopped"),
                SessionStatus::Paused => (NotificationKind::Info, "Session Paused"),
                SessionStatus::Running => (NotificationKind::Success, "Session Resumed"),
                _ => return None,
            };
            let message = change.name.as_ref().map(|name| format!("Session \"{}\"", name));
            NotificationDraft::new(kind, title, message)
        }
        _ => return None,
    };
    Some(draft)
}

/// Forward notable channel events to `dispatcher` until the returned
/// subscriptions are dropped.
pub fn install_bridge(
    channel: &ChannelClient,
    dispatcher: &NotificationDispatcher,
) -> Vec<Subscription> {
    [
        names::CONNECTION_STATUS,
        names::CONNECTION_ERROR,
        names::SYSTEM_ERROR,
        names::PROFILE_FAILED,
        names::SESSION_STATUS_CHANGED,
    ]
    .into_iter()
    .map(|name| {
        let dispatcher = dispatcher.clone();
        channel.subscribe(name, move |event: &ChannelEvent| {
            if let Some(draft) = notification_for(event) {
                dispatcher.notify(draft.kind, &draft.title, draft.message.as_deref());
            }
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notification;
    use scrapewatch_protocol::{
        ConnectionError, ConnectionStatus, ProfileFailed, SessionId, SessionStatusChanged,
    };

    #[test]
    fn test_connection_events() {
        let up = notification_for(&ChannelEvent::ConnectionStatus(ConnectionStatus {
            connected: true,
            reason: None,
        }))
        .unwrap();
        assert_eq!(up.kind, NotificationKind::Success);
        assert_eq!(up.title, "Connected");

        let quiet_down = ChannelEvent::ConnectionStatus(ConnectionStatus {
            connected: false,
            reason: None,
        });
        assert!(notification_for(&quiet_down).is_none());

        let retrying = ChannelEvent::ConnectionError(ConnectionError {
            message: "refused".to_string(),
            fatal: false,
        });
        assert!(notification_for(&retrying).is_none());

        let fatal = ChannelEvent::ConnectionError(ConnectionError {
            message: "Max reconnection attempts reached".to_string(),
            fatal: true,
        });
        assert_eq!(notification_for(&fatal).unwrap().title, "Offline");
    }

    #[test]
    fn test_profile_failed_message() {
        let event = ChannelEvent::ProfileFailed(ProfileFailed {
            session_id: SessionId::new("s1"),
            username: Some("alice".to_string()),
            error: Some("private account".to_string()),
            ..ProfileFailed::default()
        });
        let draft = notification_for(&event).unwrap();
        assert_eq!(draft.kind, NotificationKind::Warning);
        assert_eq!(
            draft.message.as_deref(),
            Some("Failed to scrape @alice: private account")
        );
    }

    #[test]
    fn test_session_status_titles() {
        let changed = |status| {
            ChannelEvent::SessionStatusChanged(SessionStatusChanged {
                session_id: SessionId::new("s1"),
                status,
                name: Some("spring".to_string()),
            })
        };
        let done = notification_for(&changed(SessionStatus::Completed)).unwrap();
        assert_eq!(done.title, "Session Completed");
        assert_eq!(done.message.as_deref(), Some("Session \"spring\""));
        assert_eq!(
            notification_for(&changed(SessionStatus::Running)).unwrap().title,
            "Session Resumed"
        );
        assert!(notification_for(&changed(SessionStatus::Pending)).is_none());
    }

    #[test]
    fn test_bridge_forwards_channel_events() {
        let (transport, _server) = crate::channel::memory::memory_transport();
        let channel = ChannelClient::new(transport, crate::channel::ReconnectPolicy::default());
        let dispatcher = NotificationDispatcher::default();
        let titles = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let _listener = {
            let titles = titles.clone();
            dispatcher.subscribe(move |n: &Notification| {
                titles.lock().unwrap().push(n.title.clone())
            })
        };

        let bridge = install_bridge(&channel, &dispatcher);
        channel.disconnect();
        assert_eq!(*titles.lock().unwrap(), vec!["Disconnected".to_string()]);

        drop(bridge);
        channel.disconnect();
        assert_eq!(titles.lock().unwrap().len(), 1);
    }
}
