// Transport ports for the live-update socket plus the tungstenite-backed adapter.

use crate::domain::{ProtocolError, TransportError};
use async_trait::async_trait;
use futures::SinkExt;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

/// One inbound text frame, or a frame the protocol cannot carry.
pub type InboundFrame = Result<String, ProtocolError>;

/// An open duplex text connection.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    /// Next inbound frame; `None` once the peer closed the connection.
    async fn recv_frame(&mut self) -> Option<Result<InboundFrame, TransportError>>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport + 'static;

    async fn connect(&self, url: &str) -> Result<Self::Transport, TransportError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str) -> Result<WsTransport, TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(status = %response.status(), "websocket handshake complete");
        Ok(WsTransport { stream })
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            };
            match message {
                Message::Text(text) => return Some(Ok(Ok(text.to_string()))),
                Message::Binary(_) => return Some(Ok(Err(ProtocolError::BinaryFrame))),
                // Control frames are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                Message::Close(frame) => {
                    debug!(?frame, "close frame received");
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
