//! Push transport abstraction and the WebSocket implementation.
//!
//! [`Transport`] is the seam between the bus client and the wire: one
//! [`subscribe`](Transport::subscribe) call opens exactly one underlying
//! subscription and yields a stream of [`TransportEvent`]s. Production
//! code uses [`WsTransport`]; tests inject counting fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Signals delivered by a transport subscription.
///
/// `Connected` is emitted once the subscription is live so the bus can
/// bind connection state to transport transitions rather than polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The subscription is established and frames may follow.
    Connected,
    /// A raw text frame received on the channel.
    Frame(String),
    /// The server closed the subscription.
    Disconnected,
    /// A receive-side transport error; the stream ends after this.
    Error(String),
}

/// Errors establishing a transport subscription.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish the underlying connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

/// A push transport capable of subscribing to a named channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open one subscription to `channel`.
    ///
    /// The returned stream ends when the connection is gone; the caller
    /// decides whether to re-subscribe.
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<BoxStream<'static, TransportEvent>, TransportError>;
}

/// WebSocket transport backed by `tokio-tungstenite`.
pub struct WsTransport {
    ws_url: String,
}

impl WsTransport {
    /// Create a transport targeting a WebSocket base URL, e.g.
    /// `ws://host:8100`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into() }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<BoxStream<'static, TransportEvent>, TransportError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!(
            "{}/ws?channel={}&clientId={}",
            self.ws_url, channel, client_id
        );

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            TransportError::Connection(format!(
                "Failed to connect to push endpoint at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(channel, client_id = %client_id, "Subscribed to push channel at {}", self.ws_url);

        let frames = ws_stream.filter_map(|msg| {
            futures::future::ready(match msg {
                Ok(Message::Text(text)) => Some(TransportEvent::Frame(text)),
                Ok(Message::Binary(_)) => {
                    // The job channel is text-only; binary frames are
                    // not part of the protocol.
                    tracing::trace!("Ignoring binary frame on job channel");
                    None
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                    None
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "Push channel closed by server");
                    Some(TransportEvent::Disconnected)
                }
                Ok(Message::Frame(_)) => None,
                Err(e) => {
                    tracing::error!(error = %e, "WebSocket receive error");
                    Some(TransportEvent::Error(e.to_string()))
                }
            })
        });

        Ok(futures::stream::once(futures::future::ready(TransportEvent::Connected))
            .chain(frames)
            .boxed())
    }
}
