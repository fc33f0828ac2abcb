use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use super::{Connector, Socket, SocketEvent, TransportError, TransportResult};

/// Opens `ws://` and `wss://` endpoints with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> TransportResult<Box<dyn Socket>> {
        let endpoint = parse_endpoint(url)?;
        let (stream, response) = connect_async(endpoint.as_str()).await?;
        debug!(
            target: "waterfall.transport",
            url = %endpoint,
            status = %response.status(),
            "websocket handshake complete"
        );
        Ok(Box::new(WebSocketSocket { stream }))
    }
}

pub fn parse_endpoint(url: &str) -> TransportResult<Url> {
    let parsed = Url::parse(url.trim()).map_err(|source| TransportError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(TransportError::UnsupportedScheme(other.to_string())),
    }
}

struct WebSocketSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Socket for WebSocketSocket {
    async fn send_text(&mut self, text: String) -> TransportResult<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(send_error)
    }

    async fn next_event(&mut self) -> SocketEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Close(frame))) => {
                    debug!(target: "waterfall.transport", ?frame, "peer closed websocket");
                    return SocketEvent::Disconnected;
                }
                Some(Ok(message)) => {
                    // The endpoint never answers; anything it sends is informational.
                    trace!(
                        target: "waterfall.transport",
                        bytes = message.len(),
                        "ignoring inbound frame"
                    );
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return SocketEvent::Disconnected;
                }
                Some(Err(err)) => return SocketEvent::Error(err.into()),
            }
        }
    }

    async fn close(&mut self) -> TransportResult<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// A write that loses the race with the peer's close handshake is a hangup, not a fault.
fn send_error(err: WsError) -> TransportError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        other => other.into(),
    }
}
