//! Event channel client.
//!
//! One persistent connection per [`ChannelClient`]. Incoming frames are
//! decoded once and fanned out by event name to registered handlers.
//! Subject interest is reference counted through [`SubjectGuard`]s and the
//! active set is re-sent after every successful connect, so holders never
//! notice a reconnect.

mod errors;
mod handlers;
pub mod memory;
mod reconnect;
mod subjects;
mod transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::{SinkExt, StreamExt};
use scrapewatch_protocol::{
    ChannelEvent, ConnectionError, ConnectionStatus, ControlMessage, Subject, parse_frame,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use errors::ChannelError;
pub use handlers::EventHandler;
pub use reconnect::{ReconnectPolicy, ResyncGate};
pub use transport::{Connection, FrameSink, FrameStream, Transport, WebSocketTransport};

use handlers::HandlerRegistry;
use subjects::SubjectRegistry;

const MAX_ATTEMPTS_MESSAGE: &str = "Max reconnection attempts reached";
const CLIENT_DISCONNECT_REASON: &str = "client disconnect";

/// Outbound half of the live connection plus the subject refcounts.
///
/// Kept under one lock so a subscribe racing a connect is either sent by
/// `acquire_subject` or replayed by the connect, never both.
#[derive(Default)]
struct Link {
    subjects: SubjectRegistry,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl Link {
    fn send(&self, message: &ControlMessage) -> bool {
        let Some(outbound) = &self.outbound else {
            debug!(event = "core.channel.publish_dropped", message = ?message);
            return false;
        };
        match message.to_frame() {
            Ok(frame) => outbound.send(frame).is_ok(),
            Err(e) => {
                error!(event = "core.channel.encode_failed", error = %e);
                false
            }
        }
    }
}

struct TaskControl {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    handlers: HandlerRegistry,
    link: Mutex<Link>,
    connected: AtomicBool,
    task: Mutex<Option<TaskControl>>,
}

impl Inner {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn task(&self) -> MutexGuard<'_, Option<TaskControl>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: ChannelEvent) {
        self.handlers.dispatch(&event);
    }

    fn mark_disconnected(&self) {
        let mut link = self.link();
        link.outbound = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Clear the link only if `owner` still holds it. Returns whether it did.
    fn release_link(&self, owner: &mpsc::WeakUnboundedSender<String>) -> bool {
        let mut link = self.link();
        let owned = match (&link.outbound, owner.upgrade()) {
            (Some(current), Some(mine)) => current.same_channel(&mine),
            _ => false,
        };
        if owned {
            link.outbound = None;
            self.connected.store(false, Ordering::SeqCst);
        }
        owned
    }

    fn stop_task(&self) {
        if let Some(control) = self.task().take() {
            control.cancel.cancel();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(control) = self.task.get_mut().ok().and_then(Option::take) {
            control.cancel.cancel();
        }
    }
}

/// Handle to the event channel. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct ChannelClient {
    inner: Arc<Inner>,
}

impl ChannelClient {
    pub fn new(transport: impl Transport, policy: ReconnectPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                policy,
                handlers: HandlerRegistry::default(),
                link: Mutex::new(Link::default()),
                connected: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }

    /// Start the connection task. No-op while one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(&self) {
        let mut task = self.inner.task();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_connection(
            Arc::downgrade(&self.inner),
            self.inner.policy,
            cancel.clone(),
        ));
        *task = Some(TaskControl { cancel, handle });
        info!(event = "core.channel.init_completed");
    }

    /// Stop the connection and drop every handler.
    pub fn teardown(&self) {
        self.inner.stop_task();
        self.inner.mark_disconnected();
        self.inner.handlers.clear();
        info!(event = "core.channel.teardown_completed");
    }

    /// Register `handler` for events named `name`. The handler stays
    /// registered until the returned guard is dropped.
    pub fn subscribe<F>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let id = self.inner.handlers.add(name, Arc::new(handler));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            name: name.to_string(),
            id,
            active: true,
        }
    }

    /// Number of handlers registered for `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.inner.handlers.count(name)
    }

    /// Queue `message` on the live connection. Returns false, and drops the
    /// message, when disconnected.
    pub fn publish(&self, message: &ControlMessage) -> bool {
        self.inner.link().send(message)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Close the current connection and start over with a fresh attempt
    /// budget. Tracked subjects are kept and re-sent on connect.
    pub fn reconnect(&self) {
        info!(event = "core.channel.reconnect_requested");
        self.inner.stop_task();
        self.inner.mark_disconnected();
        self.init();
    }

    /// Close the connection without reconnecting.
    ///
    /// Subject interest stays with its guards and is replayed if the client
    /// is initialized again.
    pub fn disconnect(&self) {
        let was_connected = self.is_connected();
        self.inner.stop_task();
        self.inner.mark_disconnected();
        info!(event = "core.channel.disconnect_completed", was_connected = was_connected);
        self.inner.emit(ChannelEvent::ConnectionStatus(ConnectionStatus {
            connected: false,
            reason: Some(CLIENT_DISCONNECT_REASON.to_string()),
        }));
    }

    /// Register interest in `subject`. The first holder sends the subscribe
    /// message; dropping the last guard sends the unsubscribe.
    pub fn acquire_subject(&self, subject: Subject) -> SubjectGuard {
        let mut link = self.inner.link();
        if link.subjects.acquire(&subject) {
            let sent = link.send(&ControlMessage::subscribe_to(&subject));
            debug!(event = "core.channel.subject_acquired", subject = %subject, sent = sent);
        }
        SubjectGuard {
            inner: Arc::downgrade(&self.inner),
            subject,
        }
    }

    /// Subjects that will be re-sent on the next connect.
    pub fn tracked_subjects(&self) -> Vec<Subject> {
        self.inner.link().subjects.active().cloned().collect()
    }
}

impl std::fmt::Debug for ChannelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelClient")
            .field("connected", &self.is_connected())
            .field("subjects", &self.tracked_subjects())
            .finish()
    }
}

/// Registration of one event handler. Dropping it unregisters.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    inner: Weak<Inner>,
    name: String,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(inner) = self.inner.upgrade() {
            inner.handlers.remove(&self.name, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

/// Held interest in one subject.
#[must_use = "dropping a SubjectGuard releases the subject"]
pub struct SubjectGuard {
    inner: Weak<Inner>,
    subject: Subject,
}

impl SubjectGuard {
    pub fn subject(&self) -> &Subject {
        &self.subject
    }
}

impl Drop for SubjectGuard {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut link = inner.link();
        if link.subjects.release(&self.subject) {
            if let Some(message) = ControlMessage::unsubscribe_from(&self.subject) {
                link.send(&message);
            }
            debug!(event = "core.channel.subject_released", subject = %self.subject);
        }
    }
}

impl std::fmt::Debug for SubjectGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectGuard")
            .field("subject", &self.subject)
            .finish()
    }
}

enum ServeEnd {
    Canceled,
    Closed(String),
}

/// Connect, serve, and reconnect until cancelled or out of attempts.
async fn run_connection(inner: Weak<Inner>, policy: ReconnectPolicy, cancel: CancellationToken) {
    let mut delays = policy.delays();
    let mut failures: u32 = 0;

    loop {
        let Some(transport) = inner.upgrade().map(|i| i.transport.clone()) else {
            return;
        };
        info!(event = "core.channel.connect_started", attempt = failures + 1);

        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = transport.connect() => result,
        };
        drop(transport);

        match attempt {
            Ok(connection) => {
                failures = 0;
                delays = policy.delays();
                match serve(&inner, connection, &cancel).await {
                    ServeEnd::Canceled => return,
                    ServeEnd::Closed(reason) => {
                        let Some(strong) = inner.upgrade() else {
                            return;
                        };
                        warn!(event = "core.channel.connection_lost", reason = %reason);
                        strong.emit(ChannelEvent::ConnectionStatus(ConnectionStatus {
                            connected: false,
                            reason: Some(reason),
                        }));
                    }
                }
            }
            Err(e) => {
                failures += 1;
                warn!(
                    event = "core.channel.connect_failed",
                    attempt = failures,
                    max_attempts = policy.max_attempts,
                    error = %e,
                );
                if failures >= policy.max_attempts {
                    error!(event = "core.channel.reconnect_exhausted", attempts = failures);
                    if let Some(strong) = inner.upgrade() {
                        strong.emit(ChannelEvent::ConnectionError(ConnectionError {
                            message: MAX_ATTEMPTS_MESSAGE.to_string(),
                            fatal: true,
                        }));
                    }
                    return;
                }
            }
        }

        let delay = delays.next().unwrap_or(policy.max_delay);
        debug!(event = "core.channel.reconnect_scheduled", delay_ms = delay.as_millis() as u64);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Pump one live connection until it closes or the task is cancelled.
async fn serve(inner: &Weak<Inner>, connection: Connection, cancel: &CancellationToken) -> ServeEnd {
    let Connection {
        mut sink,
        mut stream,
    } = connection;
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let owner = outbound_tx.downgrade();

    {
        let Some(strong) = inner.upgrade() else {
            return ServeEnd::Canceled;
        };
        let resubscribed = {
            let mut link = strong.link();
            // Checked under the lock: a local disconnect cancels first and
            // then clears the link, so a superseded task stops here.
            if cancel.is_cancelled() {
                debug!(event = "core.channel.connect_superseded");
                return ServeEnd::Canceled;
            }
            link.outbound = Some(outbound_tx);
            strong.connected.store(true, Ordering::SeqCst);
            let replay: Vec<ControlMessage> = link
                .subjects
                .active()
                .map(ControlMessage::subscribe_to)
                .collect();
            replay.iter().filter(|m| link.send(m)).count()
        };
        info!(event = "core.channel.connect_completed", resubscribed = resubscribed);
        strong.emit(ChannelEvent::ConnectionStatus(ConnectionStatus {
            connected: true,
            reason: None,
        }));
    }

    let end = pump(inner, &mut sink, &mut stream, &mut outbound_rx, cancel).await;
    let Some(strong) = inner.upgrade() else {
        return ServeEnd::Canceled;
    };
    match end {
        ServeEnd::Closed(reason) if strong.release_link(&owner) => ServeEnd::Closed(reason),
        ServeEnd::Closed(_) => ServeEnd::Canceled,
        ServeEnd::Canceled => {
            strong.release_link(&owner);
            ServeEnd::Canceled
        }
    }
}

async fn pump(
    inner: &Weak<Inner>,
    sink: &mut FrameSink,
    stream: &mut FrameStream,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> ServeEnd {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Err(e) = sink.close().await {
                    debug!(event = "core.channel.close_failed", error = %e);
                }
                return ServeEnd::Canceled;
            }
            outbound = outbound_rx.recv() => {
                // The sender only goes away when the link is reset by a
                // local disconnect, which also cancels this task.
                let Some(frame) = outbound else {
                    return ServeEnd::Canceled;
                };
                if let Err(e) = sink.send(frame).await {
                    return ServeEnd::Closed(e.to_string());
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(text)) => {
                    let Some(strong) = inner.upgrade() else {
                        return ServeEnd::Canceled;
                    };
                    dispatch_frame(&strong, &text);
                }
                Some(Err(e)) => return ServeEnd::Closed(e.to_string()),
                None => return ServeEnd::Closed("transport closed".to_string()),
            }
        }
    }
}

fn dispatch_frame(inner: &Inner, text: &str) {
    match parse_frame(text) {
        Ok(events) => {
            for event in &events {
                let delivered = inner.handlers.dispatch(event);
                debug!(event = "core.channel.event_dispatched", name = event.name(), handlers = delivered);
            }
        }
        Err(e) => warn!(event = "core.channel.frame_decode_failed", error = %e),
    }
}
