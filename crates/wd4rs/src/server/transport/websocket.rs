use super::{TransportReceiver, TransportSender};
use crate::{Error, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport to a BiDi endpoint (e.g. `ws://127.0.0.1:9222/session`)
pub struct WebSocketTransport {
    message_tx: mpsc::UnboundedSender<JsonValue>,
    sender: SplitSink<WsStream, WsMessage>,
    receiver: SplitStream<WsStream>,
}

pub struct WebSocketTransportReceiver {
    receiver: SplitStream<WsStream>,
    message_tx: mpsc::UnboundedSender<JsonValue>,
}

pub struct WebSocketTransportSender {
    sender: SplitSink<WsStream, WsMessage>,
}

impl WebSocketTransport {
    /// Opens the WebSocket. Every inbound JSON frame is forwarded to the
    /// returned receiver once the receiving half is running.
    pub async fn connect(
        url: &str,
        headers: Option<HashMap<String, String>>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<JsonValue>)> {
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        let parsed = Url::parse(url)
            .map_err(|e| Error::ConnectionFailed(format!("Invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::ConnectionFailed(format!(
                "Unsupported scheme '{}', expected ws or wss",
                parsed.scheme()
            )));
        }

        use tokio_tungstenite::tungstenite::client::IntoClientRequest;
        let mut request = url
            .into_client_request()
            .map_err(|e| Error::TransportError(format!("Failed to build request: {}", e)))?;

        if let Some(headers_map) = headers {
            use std::str::FromStr;
            use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue};
            let headers = request.headers_mut();
            for (k, v) in headers_map {
                let name = HeaderName::from_str(&k)
                    .map_err(|e| Error::InvalidArgument(format!("Invalid header name: {}", e)))?;
                let value = HeaderValue::from_str(&v)
                    .map_err(|e| Error::InvalidArgument(format!("Invalid header value: {}", e)))?;
                headers.insert(name, value);
            }
        }

        tracing::debug!("Connecting to {}", parsed);
        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("WebSocket connection failed: {}", e)))?;

        let (sender, receiver) = ws_stream.split();

        Ok((
            Self {
                message_tx,
                sender,
                receiver,
            },
            message_rx,
        ))
    }

    pub fn into_parts(self) -> (WebSocketTransportSender, WebSocketTransportReceiver) {
        (
            WebSocketTransportSender {
                sender: self.sender,
            },
            WebSocketTransportReceiver {
                receiver: self.receiver,
                message_tx: self.message_tx,
            },
        )
    }
}

impl TransportSender for WebSocketTransportSender {
    fn send(
        &mut self,
        message: JsonValue,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let json_str = serde_json::to_string(&message)?;
            self.sender
                .send(WsMessage::Text(json_str.into()))
                .await
                .map_err(|e| {
                    Error::TransportError(format!("Failed to send WebSocket message: {}", e))
                })
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            SinkExt::close(&mut self.sender)
                .await
                .map_err(|e| Error::TransportError(format!("Failed to close WebSocket: {}", e)))
        })
    }
}

impl TransportReceiver for WebSocketTransportReceiver {
    fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            while let Some(msg_result) = self.receiver.next().await {
                let msg = msg_result
                    .map_err(|e| Error::TransportError(format!("WebSocket read error: {}", e)))?;
                match msg {
                    WsMessage::Text(text) => match serde_json::from_str::<JsonValue>(&text) {
                        Ok(message) => {
                            if self.message_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("Dropping non-JSON frame: {}", e),
                    },
                    WsMessage::Binary(data) => {
                        tracing::debug!("Ignoring binary frame ({} bytes)", data.len());
                    }
                    WsMessage::Close(frame) => {
                        tracing::debug!("WebSocket closed by remote end: {:?}", frame);
                        break;
                    }
                    _ => {}
                }
            }
            Ok(())
        })
    }
}
