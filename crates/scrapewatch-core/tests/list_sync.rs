//! Integration tests for the list driver: stale-response suppression,
//! debounce coalescing, live patching from channel events, and refetching
//! after a lost connection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use scrapewatch_core::channel::memory::memory_transport;
use scrapewatch_core::list::{ListSettings, ProfileSource};
use scrapewatch_core::{
    ChannelClient, FilterSet, FilterUpdate, ItemStatus, ListEngine, ListSync, ProfilePage,
    ProfileRecord, ReconnectPolicy, SessionId, SyncError, TokioClock,
};
use tokio::sync::oneshot;

type Reply = oneshot::Sender<Result<ProfilePage, SyncError>>;

/// Records each request and lets the test answer it later, in any order.
#[derive(Default)]
struct ScriptedSource {
    requests: Mutex<Vec<(FilterSet, Option<Reply>)>>,
}

impl ScriptedSource {
    fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn filter(&self, index: usize) -> FilterSet {
        self.requests.lock().unwrap()[index].0.clone()
    }

    fn answer(&self, index: usize, result: Result<ProfilePage, SyncError>) {
        if let Some(reply) = self.requests.lock().unwrap()[index].1.take() {
            let _ = reply.send(result);
        }
    }
}

impl ProfileSource for ScriptedSource {
    fn fetch_page(
        &self,
        _session: Option<&SessionId>,
        filter: &FilterSet,
    ) -> BoxFuture<'static, Result<ProfilePage, SyncError>> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .lock()
            .unwrap()
            .push((filter.clone(), Some(tx)));
        async move { rx.await.unwrap_or(Err(SyncError::Canceled)) }.boxed()
    }
}

fn page(names: &[&str]) -> ProfilePage {
    ProfilePage {
        profiles: names
            .iter()
            .map(|name| ProfileRecord {
                username: Some(name.to_string()),
                depth: Some(1),
                status: ItemStatus::Pending,
                ..ProfileRecord::default()
            })
            .collect(),
        total_count: names.len() as u64,
        page: 1,
        limit: 20,
        total_pages: 1,
        has_more: false,
    }
}

fn usernames(sync: &ListSync) -> Vec<String> {
    sync.view()
        .items()
        .iter()
        .filter_map(|item| item.username.clone())
        .collect()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn start(source: Arc<ScriptedSource>, channel: &ChannelClient) -> ListSync {
    let engine = ListEngine::new(
        Some(SessionId::new("s1")),
        FilterSet::default(),
        ListSettings::default(),
    );
    ListSync::spawn(engine, source, channel, Arc::new(TokioClock))
}

#[tokio::test(start_paused = true)]
async fn test_late_response_for_old_filter_is_ignored() {
    let (transport, _server) = memory_transport();
    let channel = ChannelClient::new(transport, ReconnectPolicy::default());
    let source = Arc::new(ScriptedSource::default());
    let sync = start(source.clone(), &channel);
    settle().await;
    assert_eq!(source.count(), 1);
    assert!(sync.view().loading);

    sync.load(FilterSet {
        status: Some(ItemStatus::Failed),
        ..FilterSet::default()
    });
    settle().await;
    assert_eq!(source.count(), 2);

    source.answer(1, Ok(page(&["failed-1"])));
    settle().await;
    source.answer(0, Ok(page(&["stale-1", "stale-2"])));
    settle().await;

    let view = sync.view();
    assert!(!view.loading);
    assert!(view.error.is_none());
    assert_eq!(usernames(&sync), vec!["failed-1".to_string()]);

    sync.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rapid_filter_edits_issue_one_request() {
    let (transport, _server) = memory_transport();
    let channel = ChannelClient::new(transport, ReconnectPolicy::default());
    let source = Arc::new(ScriptedSource::default());
    let sync = start(source.clone(), &channel);
    settle().await;
    source.answer(0, Ok(page(&["a"])));
    settle().await;

    sync.set_filter(FilterUpdate::Depth(Some(1)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    sync.set_filter(FilterUpdate::Status(Some(ItemStatus::Pending)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.count(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.count(), 2);
    let sent = source.filter(1);
    assert_eq!(sent.depth, Some(1));
    assert_eq!(sent.status, Some(ItemStatus::Pending));

    // Old rows stay visible while the new filter loads.
    let view = sync.view();
    assert!(view.transitioning);
    assert_eq!(view.len(), 1);

    sync.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_channel_events_patch_displayed_rows() {
    let (transport, server) = memory_transport();
    let channel = ChannelClient::new(transport, ReconnectPolicy::default());
    channel.init();
    let source = Arc::new(ScriptedSource::default());
    let sync = start(source.clone(), &channel);
    settle().await;
    source.answer(0, Ok(page(&["alice", "bob"])));
    settle().await;

    assert!(
        server
            .received(0)
            .contains(&r#"{"event":"subscribe:session","data":"s1"}"#.to_string())
    );

    server.push(
        r#"{"event":"profile:statusUpdate","data":{"sessionId":"s1","username":"bob","depth":1,"status":"failed","error":"private"}}"#,
    );
    server.push(
        r#"{"event":"profile:statusUpdate","data":{"sessionId":"other","username":"alice","depth":1,"status":"scraped"}}"#,
    );
    settle().await;

    let view = sync.view();
    let bob = view.get("bob").unwrap();
    assert_eq!(bob.status, ItemStatus::Failed);
    assert_eq!(bob.error.as_deref(), Some("private"));
    assert_eq!(view.get("alice").unwrap().status, ItemStatus::Pending);
    assert_eq!(view.len(), 2);

    sync.shutdown().await;
    channel.teardown();
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_lost_connection_refetches() {
    let (transport, server) = memory_transport();
    let channel = ChannelClient::new(transport, ReconnectPolicy::default());
    channel.init();
    let source = Arc::new(ScriptedSource::default());
    let sync = start(source.clone(), &channel);
    settle().await;
    source.answer(0, Ok(page(&["alice"])));
    settle().await;
    assert!(channel.is_connected());
    assert_eq!(source.count(), 1);

    // Events missed while offline are never replayed.
    server.drop_connection();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(source.count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(server.connection_count(), 2);
    assert_eq!(source.count(), 2);
    assert_eq!(source.filter(1), FilterSet::default());

    source.answer(1, Ok(page(&["alice", "bob"])));
    settle().await;
    assert_eq!(usernames(&sync), vec!["alice".to_string(), "bob".to_string()]);

    sync.shutdown().await;
    channel.teardown();
}
