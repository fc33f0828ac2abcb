use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub mod mock;
pub mod websocket;

pub use websocket::WebSocketConnector;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("unsupported endpoint scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),
    #[error("connect to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("socket closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Something the remote side did to an open socket.
#[derive(Debug)]
pub enum SocketEvent {
    Disconnected,
    Error(TransportError),
}

/// An established text-frame socket. Owned and driven by exactly one worker.
///
/// `next_event` must be cancel safe: the worker races it against other inputs
/// and drops the future whenever something else wins.
#[async_trait]
pub trait Socket: Send {
    async fn send_text(&mut self, text: String) -> TransportResult<()>;

    /// Resolves once the peer disconnects or the transport fails.
    async fn next_event(&mut self) -> SocketEvent;

    async fn close(&mut self) -> TransportResult<()>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> TransportResult<Box<dyn Socket>>;
}
