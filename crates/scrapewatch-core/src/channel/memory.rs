//! In-process transport for exercising the channel client without a socket.
//!
//! [`memory_transport`] returns the client half and a [`MemoryServer`] that
//! can refuse connects, push frames, drop the live connection, and read back
//! every frame the client sent on each connection.

use std::sync::{Arc, Mutex};

use futures::channel::mpsc;
use futures::future::BoxFuture;

use super::errors::ChannelError;
use super::transport::{Connection, Transport};

type ServerFeed = mpsc::UnboundedSender<Result<String, ChannelError>>;

#[derive(Default)]
struct ServerConnection {
    received: Arc<Mutex<Vec<String>>>,
    feed: Option<ServerFeed>,
}

#[derive(Default)]
struct ServerState {
    attempts: usize,
    refuse: usize,
    connections: Vec<ServerConnection>,
}

fn lock(state: &Mutex<ServerState>) -> std::sync::MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Client half.
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<ServerState>>,
}

/// Server half.
#[derive(Clone)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

pub fn memory_transport() -> (MemoryTransport, MemoryServer) {
    let state = Arc::new(Mutex::new(ServerState::default()));
    (
        MemoryTransport {
            state: state.clone(),
        },
        MemoryServer { state },
    )
}

impl Transport for MemoryTransport {
    fn connect(&self) -> BoxFuture<'_, Result<Connection, ChannelError>> {
        let result = {
            let mut state = lock(&self.state);
            state.attempts += 1;
            if state.refuse > 0 {
                state.refuse -= 1;
                Err(ChannelError::ConnectFailed {
                    url: "memory://".to_string(),
                    message: "connection refused".to_string(),
                })
            } else {
                let (feed, stream) = mpsc::unbounded();
                let received = Arc::new(Mutex::new(Vec::new()));
                state.connections.push(ServerConnection {
                    received: received.clone(),
                    feed: Some(feed),
                });

                let sink = futures::sink::unfold(received, |received, frame: String| async move {
                    received
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(frame);
                    Ok::<_, ChannelError>(received)
                });

                Ok(Connection {
                    sink: Box::pin(sink),
                    stream: Box::pin(stream),
                })
            }
        };
        Box::pin(async move { result })
    }
}

impl MemoryServer {
    /// Refuse the next `n` connect attempts.
    pub fn refuse_next(&self, n: usize) {
        lock(&self.state).refuse = n;
    }

    /// Deliver a text frame on the live connection. False if there is none.
    pub fn push(&self, frame: impl Into<String>) -> bool {
        let state = lock(&self.state);
        match state.connections.last().and_then(|c| c.feed.as_ref()) {
            Some(feed) => feed.unbounded_send(Ok(frame.into())).is_ok(),
            None => false,
        }
    }

    /// Close the live connection from the server side.
    pub fn drop_connection(&self) {
        let mut state = lock(&self.state);
        if let Some(connection) = state.connections.last_mut() {
            connection.feed = None;
        }
    }

    pub fn attempts(&self) -> usize {
        lock(&self.state).attempts
    }

    pub fn connection_count(&self) -> usize {
        lock(&self.state).connections.len()
    }

    /// Frames the client sent on connection `index` (0-based, in connect order).
    pub fn received(&self, index: usize) -> Vec<String> {
        let state = lock(&self.state);
        state
            .connections
            .get(index)
            .map(|c| c.received.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .unwrap_or_default()
    }
}
