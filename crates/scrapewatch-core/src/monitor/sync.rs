use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use scrapewatch_protocol::{ChannelEvent, MonitoringPayload, SessionId, Subject, names};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{FetchOutcome, fetch_cancelable};
use crate::channel::{ChannelClient, ResyncGate, SubjectGuard, Subscription};
use crate::clock::Clock;
use crate::errors::SyncError;

use super::aggregator::SessionMonitor;
use super::{MonitorAction, MonitoringSnapshot};

/// Where monitoring snapshots come from.
pub trait MonitoringSource: Send + Sync + 'static {
    fn fetch_monitoring(
        &self,
        session: &SessionId,
    ) -> BoxFuture<'static, Result<MonitoringPayload, SyncError>>;
}

const MONITOR_EVENTS: [&str; 7] = [
    names::CONNECTION_STATUS,
    names::SESSION_PROGRESS,
    names::SESSION_STATUS_CHANGED,
    names::SESSION_DEPTH_COMPLETED,
    names::PROFILE_STATUS_UPDATE,
    names::BATCH_PROCESSING,
    names::QUEUE_STATUS_UPDATE,
];

type Completion = (u64, FetchOutcome<MonitoringPayload, SyncError>);

/// A [`SessionMonitor`] running on its own task.
///
/// Holds the session subject for as long as it runs and refetches after the
/// channel recovers from a lost connection. Dropping the handle stops the
/// task.
pub struct MonitorSync {
    refetch: mpsc::UnboundedSender<()>,
    snapshot: watch::Receiver<Arc<MonitoringSnapshot>>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl MonitorSync {
    /// Start driving `monitor`, fetching its first snapshot immediately.
    pub fn spawn(
        monitor: SessionMonitor,
        source: Arc<dyn MonitoringSource>,
        channel: &ChannelClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (refetch_tx, refetch_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(monitor.snapshot());
        let shutdown = CancellationToken::new();

        let subscriptions = MONITOR_EVENTS
            .into_iter()
            .map(|name| {
                let tx = event_tx.clone();
                channel.subscribe(name, move |event: &ChannelEvent| {
                    let _ = tx.send(event.clone());
                })
            })
            .collect();
        let guard = channel.acquire_subject(Subject::Session(monitor.session().clone()));

        let driver = Driver {
            monitor,
            source,
            clock,
            snapshot_tx,
            completions: mpsc::unbounded_channel(),
            resync: ResyncGate::default(),
            _subscriptions: subscriptions,
            _guard: guard,
        };
        let handle = tokio::spawn(driver.run(refetch_rx, event_rx, shutdown.clone()));

        Self {
            refetch: refetch_tx,
            snapshot: snapshot_rx,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn refetch(&self) {
        if self.refetch.send(()).is_err() {
            debug!(event = "core.monitor.command_dropped");
        }
    }

    pub fn snapshot(&self) -> Arc<MonitoringSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<MonitoringSnapshot>> {
        self.snapshot.clone()
    }

    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for MonitorSync {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Driver {
    monitor: SessionMonitor,
    source: Arc<dyn MonitoringSource>,
    clock: Arc<dyn Clock>,
    snapshot_tx: watch::Sender<Arc<MonitoringSnapshot>>,
    completions: (mpsc::UnboundedSender<Completion>, mpsc::UnboundedReceiver<Completion>),
    resync: ResyncGate,
    _subscriptions: Vec<Subscription>,
    _guard: SubjectGuard,
}

impl Driver {
    async fn run(
        mut self,
        mut refetch: mpsc::UnboundedReceiver<()>,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
        shutdown: CancellationToken,
    ) {
        info!(event = "core.monitor.sync_started", session = %self.monitor.session());
        self.fetch();
        self.publish();

        loop {
            let deadline = self.monitor.next_deadline();
            let wake = deadline
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = shutdown.cancelled() => break,
                request = refetch.recv() => {
                    if request.is_none() {
                        break;
                    }
                    self.fetch();
                }
                Some(event) = events.recv() => {
                    if self.resync.observe(&event) {
                        debug!(event = "core.monitor.resync_started");
                        self.fetch();
                    } else if self.monitor.on_event(&event, self.clock.now()) == MonitorAction::Refetch {
                        self.fetch();
                    }
                }
                Some((seq, outcome)) = self.completions.1.recv() => {
                    self.monitor.complete(seq, outcome);
                }
                _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                    self.monitor.poll_timers(self.clock.now());
                }
            }
            self.publish();
        }

        self.monitor.dispose();
        info!(event = "core.monitor.sync_stopped", session = %self.monitor.session());
    }

    fn fetch(&mut self) {
        let ticket = self.monitor.begin_fetch();
        let request = self.source.fetch_monitoring(self.monitor.session());
        let completions = self.completions.0.clone();
        tokio::spawn(async move {
            let outcome = fetch_cancelable(&ticket.token, request).await;
            let _ = completions.send((ticket.seq, outcome));
        });
    }

    fn publish(&self) {
        let snapshot = self.monitor.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if Arc::ptr_eq(current, &snapshot) {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
