use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use scrapewatch_protocol::{ChannelEvent, Subject, SystemSnapshot, names};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{FetchOutcome, fetch_cancelable};
use crate::channel::{ChannelClient, ResyncGate, SubjectGuard, Subscription};
use crate::clock::Clock;
use crate::errors::SyncError;
use crate::monitor::MonitorAction;

use super::{SystemMonitor, SystemView};

pub trait SystemSource: Send + Sync + 'static {
    fn fetch_system(&self) -> BoxFuture<'static, Result<SystemSnapshot, SyncError>>;
}

const SYSTEM_EVENTS: [&str; 6] = [
    names::CONNECTION_STATUS,
    names::SYSTEM_METRICS,
    names::SYSTEM_NOTIFICATION,
    names::SYSTEM_ERROR,
    names::QUEUE_STATUS_UPDATE,
    names::SESSION_STATUS_CHANGED,
];

type Completion = (u64, FetchOutcome<SystemSnapshot, SyncError>);

/// A [`SystemMonitor`] on its own task, refreshed on a fixed interval while
/// it holds the system subject.
pub struct SystemSync {
    refresh: mpsc::UnboundedSender<()>,
    view: watch::Receiver<Arc<SystemView>>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SystemSync {
    pub fn spawn(
        monitor: SystemMonitor,
        source: Arc<dyn SystemSource>,
        channel: &ChannelClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(monitor.view());
        let shutdown = CancellationToken::new();

        let subscriptions = SYSTEM_EVENTS
            .into_iter()
            .map(|name| {
                let tx = event_tx.clone();
                channel.subscribe(name, move |event: &ChannelEvent| {
                    let _ = tx.send(event.clone());
                })
            })
            .collect();
        let guard = channel.acquire_subject(Subject::System);

        let driver = Driver {
            monitor,
            source,
            clock,
            view_tx,
            completions: mpsc::unbounded_channel(),
            resync: ResyncGate::default(),
            _subscriptions: subscriptions,
            _guard: guard,
        };
        let handle = tokio::spawn(driver.run(refresh_rx, event_rx, shutdown.clone()));

        Self {
            refresh: refresh_tx,
            view: view_rx,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn refresh(&self) {
        if self.refresh.send(()).is_err() {
            debug!(event = "core.system.command_dropped");
        }
    }

    pub fn view(&self) -> Arc<SystemView> {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<SystemView>> {
        self.view.clone()
    }

    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SystemSync {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Driver {
    monitor: SystemMonitor,
    source: Arc<dyn SystemSource>,
    clock: Arc<dyn Clock>,
    view_tx: watch::Sender<Arc<SystemView>>,
    completions: (mpsc::UnboundedSender<Completion>, mpsc::UnboundedReceiver<Completion>),
    resync: ResyncGate,
    _subscriptions: Vec<Subscription>,
    _guard: SubjectGuard,
}

impl Driver {
    async fn run(
        mut self,
        mut refresh: mpsc::UnboundedReceiver<()>,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
        shutdown: CancellationToken,
    ) {
        info!(event = "core.system.sync_started");
        self.fetch();
        self.monitor.schedule_refresh(self.clock.now());
        self.publish();

        loop {
            let deadline = self.monitor.next_deadline();
            let wake = deadline
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = shutdown.cancelled() => break,
                request = refresh.recv() => {
                    if request.is_none() {
                        break;
                    }
                    self.fetch();
                }
                Some(event) = events.recv() => {
                    if self.resync.observe(&event) {
                        debug!(event = "core.system.resync_started");
                        self.fetch();
                    } else if self.monitor.on_event(&event, Utc::now()) == MonitorAction::Refetch {
                        self.fetch();
                    }
                }
                Some((seq, outcome)) = self.completions.1.recv() => {
                    self.monitor.complete(seq, outcome, Utc::now());
                }
                _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                    if self.monitor.poll_timers(self.clock.now()) {
                        self.fetch();
                    }
                }
            }
            self.publish();
        }

        self.monitor.dispose();
        info!(event = "core.system.sync_stopped");
    }

    fn fetch(&mut self) {
        let ticket = self.monitor.begin_fetch();
        let request = self.source.fetch_system();
        let completions = self.completions.0.clone();
        tokio::spawn(async move {
            let outcome = fetch_cancelable(&ticket.token, request).await;
            let _ = completions.send((ticket.seq, outcome));
        });
    }

    fn publish(&self) {
        let view = self.monitor.view();
        self.view_tx.send_if_modified(|current| {
            if Arc::ptr_eq(current, &view) {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}
