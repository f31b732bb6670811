//! Transport seam for the event channel.
//!
//! A [`Transport`] opens a [`Connection`]: a sink and a stream of JSON text
//! frames. The client never sees websocket message types.

use std::pin::Pin;

use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::errors::ChannelError;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ChannelError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ChannelError>> + Send>>;

/// One established connection. The stream ending means the peer went away.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

pub trait Transport: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'_, Result<Connection, ChannelError>>;
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self) -> BoxFuture<'_, Result<Connection, ChannelError>> {
        Box::pin(async move {
            let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
                .await
                .map_err(|e| ChannelError::ConnectFailed {
                    url: self.url.clone(),
                    message: e.to_string(),
                })?;

            let (write, read) = socket.split();

            let sink = write
                .sink_map_err(|e| ChannelError::Transport {
                    message: e.to_string(),
                })
                .with(|frame: String| future::ready(Ok::<_, ChannelError>(Message::Text(frame))));

            let stream = read.filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Close(frame)) => Some(Err(ChannelError::Closed {
                        reason: frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "server closed the connection".to_string()),
                    })),
                    Ok(other) => {
                        debug!(event = "core.channel.frame_skipped", kind = ?other);
                        None
                    }
                    Err(e) => Some(Err(ChannelError::Transport {
                        message: e.to_string(),
                    })),
                })
            });

            Ok(Connection {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}
