use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use scrapewatch_protocol::{ChannelEvent, ProfilePage, SessionId, Subject, names};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{FetchOutcome, fetch_cancelable};
use crate::channel::{ChannelClient, ResyncGate, SubjectGuard, Subscription};
use crate::clock::Clock;
use crate::errors::SyncError;

use super::engine::{ListEngine, LoadDecision};
use super::filter::{FilterSet, FilterUpdate};
use super::view::ViewState;

/// Where list pages come from.
pub trait ProfileSource: Send + Sync + 'static {
    fn fetch_page(
        &self,
        session: Option<&SessionId>,
        filter: &FilterSet,
    ) -> BoxFuture<'static, Result<ProfilePage, SyncError>>;
}

#[derive(Debug)]
enum Command {
    Load(FilterSet),
    SetFilter(FilterUpdate),
    Refresh,
    ClearCache,
    CancelInflight,
}

type Completion = (u64, FetchOutcome<ProfilePage, SyncError>);

/// A [`ListEngine`] running on its own task.
///
/// Item events for the engine's session are forwarded from the channel and
/// the session subject is held for as long as the driver runs. A reconnect
/// after a lost connection refreshes the current filter. Dropping the
/// handle stops the task and cancels any outstanding fetch.
pub struct ListSync {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<Arc<ViewState>>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ListSync {
    /// Start driving `engine`, loading its current filter immediately.
    pub fn spawn(
        engine: ListEngine,
        source: Arc<dyn ProfileSource>,
        channel: &ChannelClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(engine.view());
        let shutdown = CancellationToken::new();

        let subscriptions: Vec<Subscription> = [
            names::PROFILE_STATUS_UPDATE,
            names::PROFILE_SCRAPED,
            names::PROFILE_FAILED,
            names::CONNECTION_STATUS,
        ]
        .into_iter()
        .map(|name| {
            let tx = event_tx.clone();
            channel.subscribe(name, move |event: &ChannelEvent| {
                let _ = tx.send(event.clone());
            })
        })
        .collect();
        let guard = engine
            .session()
            .map(|id| channel.acquire_subject(Subject::Session(id.clone())));

        let driver = Driver {
            engine,
            source,
            clock,
            view_tx,
            completions: mpsc::unbounded_channel(),
            resync: ResyncGate::default(),
            _subscriptions: subscriptions,
            _guard: guard,
        };
        let handle = tokio::spawn(driver.run(command_rx, event_rx, shutdown.clone()));

        Self {
            commands: command_tx,
            view: view_rx,
            shutdown,
            handle: Some(handle),
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(event = "core.list.command_dropped");
        }
    }

    /// Replace the whole filter and load it without debouncing.
    pub fn load(&self, filter: FilterSet) {
        self.send(Command::Load(filter));
    }

    pub fn set_filter(&self, update: FilterUpdate) {
        self.send(Command::SetFilter(update));
    }

    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    pub fn clear_cache(&self) {
        self.send(Command::ClearCache);
    }

    pub fn cancel_inflight(&self) {
        self.send(Command::CancelInflight);
    }

    /// The latest published view.
    pub fn view(&self) -> Arc<ViewState> {
        self.view.borrow().clone()
    }

    /// Receiver that is notified whenever the view changes.
    pub fn watch(&self) -> watch::Receiver<Arc<ViewState>> {
        self.view.clone()
    }

    /// Stop the driver and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ListSync {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Driver {
    engine: ListEngine,
    source: Arc<dyn ProfileSource>,
    clock: Arc<dyn Clock>,
    view_tx: watch::Sender<Arc<ViewState>>,
    completions: (mpsc::UnboundedSender<Completion>, mpsc::UnboundedReceiver<Completion>),
    resync: ResyncGate,
    _subscriptions: Vec<Subscription>,
    _guard: Option<SubjectGuard>,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
        shutdown: CancellationToken,
    ) {
        info!(event = "core.list.sync_started", context = %self.engine.context());
        let initial = self.engine.filter().clone();
        let decision = self.engine.load(initial, self.clock.now());
        self.dispatch(decision);
        self.publish();

        loop {
            let deadline = self.engine.next_deadline();
            let wake = deadline
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = shutdown.cancelled() => break,
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command);
                }
                Some(event) = events.recv() => self.handle_event(&event),
                Some((seq, outcome)) = self.completions.1.recv() => {
                    self.engine.complete(seq, outcome, self.clock.now());
                }
                _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                    if let Some(decision) = self.engine.poll_timers(self.clock.now()) {
                        self.dispatch(decision);
                    }
                }
            }
            self.publish();
        }

        self.engine.dispose();
        info!(event = "core.list.sync_stopped", context = %self.engine.context());
    }

    fn handle_command(&mut self, command: Command) {
        let now = self.clock.now();
        let decision = match command {
            Command::Load(filter) => Some(self.engine.load(filter, now)),
            Command::SetFilter(update) => self.engine.set_filter(update, now),
            Command::Refresh => Some(self.engine.refresh(now)),
            Command::ClearCache => {
                self.engine.clear_cache();
                None
            }
            Command::CancelInflight => {
                self.engine.cancel_inflight();
                None
            }
        };
        if let Some(decision) = decision {
            self.dispatch(decision);
        }
    }

    fn handle_event(&mut self, event: &ChannelEvent) {
        if self.resync.observe(event) {
            debug!(event = "core.list.resync_started", context = %self.engine.context());
            let decision = self.engine.refresh(self.clock.now());
            self.dispatch(decision);
        } else {
            self.engine.apply_incremental(event);
        }
    }

    fn dispatch(&self, decision: LoadDecision) {
        let LoadDecision::Fetch { ticket, filter } = decision else {
            return;
        };
        let request = self.source.fetch_page(self.engine.session(), &filter);
        let completions = self.completions.0.clone();
        tokio::spawn(async move {
            let outcome = fetch_cancelable(&ticket.token, request).await;
            let _ = completions.send((ticket.seq, outcome));
        });
    }

    fn publish(&self) {
        let view = self.engine.view();
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
