//! WebDriver BiDi command/response connection
//!
//! Commands carry a numeric id; the remote end answers with a `success` or
//! `error` frame echoing it. Frames of type `event` are handed to the attached
//! [`EventDispatcher`] on the same receive loop, in wire order.
//!
//! See: https://w3c.github.io/webdriver-bidi/#protocol

use crate::error::{Error, Result};
use crate::protocol::event_mapper::EventEnvelope;
use crate::server::dispatcher::EventDispatcher;
use crate::server::subscription::{
    SessionCommands, SubscribeResult, SubscriptionRequest, UnsubscribeRequest,
};
use crate::server::transport::{TransportReceiver, TransportSender};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot};

/// Default time to wait for a command response, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Outbound command frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: u32,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuccessResponse {
    pub id: u32,
    #[serde(default)]
    pub result: Value,
}

/// `error` frame. `id` is null when the remote end could not parse the command.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub id: Option<u32>,
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stacktrace: Option<String>,
}

/// Inbound frame, discriminated by its `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Success(SuccessResponse),
    Error(ErrorResponse),
    Event(EventEnvelope),
}

struct PendingCommand {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
}

/// Connection to one BiDi remote end
pub struct Connection {
    last_id: AtomicU32,
    timeout_ms: AtomicU64,
    closed: AtomicBool,
    callbacks: Arc<TokioMutex<HashMap<u32, PendingCommand>>>,
    sender: Arc<TokioMutex<Box<dyn TransportSender>>>,
    message_rx: Arc<TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>>,
    transport_receiver: Arc<TokioMutex<Option<Box<dyn TransportReceiver>>>>,
    // Weak: the dispatcher owns the subscription manager, which owns us
    dispatcher: RwLock<Option<Weak<EventDispatcher>>>,
}

impl Connection {
    pub fn new(
        sender: impl TransportSender + 'static,
        receiver: impl TransportReceiver + 'static,
        message_rx: mpsc::UnboundedReceiver<Value>,
    ) -> Self {
        Self {
            last_id: AtomicU32::new(0),
            timeout_ms: AtomicU64::new(DEFAULT_TIMEOUT_MS),
            closed: AtomicBool::new(false),
            callbacks: Arc::new(TokioMutex::new(HashMap::new())),
            sender: Arc::new(TokioMutex::new(Box::new(sender))),
            message_rx: Arc::new(TokioMutex::new(Some(message_rx))),
            transport_receiver: Arc::new(TokioMutex::new(Some(Box::new(receiver)))),
            dispatcher: RwLock::new(None),
        }
    }

    /// Sets how long a command may wait for its response.
    pub fn set_command_timeout(&self, timeout_ms: u64) {
        self.timeout_ms.store(timeout_ms, Ordering::Relaxed);
    }

    pub fn command_timeout(&self) -> u64 {
        self.timeout_ms.load(Ordering::Relaxed)
    }

    /// Routes event frames to `dispatcher` from now on.
    pub fn attach_dispatcher(&self, dispatcher: &Arc<EventDispatcher>) {
        *self.dispatcher.write() = Some(Arc::downgrade(dispatcher));
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends a command and awaits its result.
    ///
    /// Fails with [`Error::RemoteError`] on an error response and with
    /// [`Error::Timeout`] if nothing arrives within the command timeout. There
    /// is no retry.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Sending command: id={}, method='{}'", id, method);

        let (tx, rx) = oneshot::channel();
        {
            let mut callbacks = self.callbacks.lock().await;
            callbacks.insert(
                id,
                PendingCommand {
                    method: method.to_string(),
                    tx,
                },
            );
            // `closed` is set before the final clear, so checking after the
            // insert cannot miss a loop that has already ended
            if self.is_closed() {
                callbacks.remove(&id);
                return Err(Error::ChannelClosed);
            }
        }

        let command = Command {
            id,
            method: method.to_string(),
            params,
        };
        let command_value = serde_json::to_value(&command)?;

        if let Err(e) = self.sender.lock().await.send(command_value).await {
            tracing::error!("Failed to send command {}: {}", method, e);
            self.callbacks.lock().await.remove(&id);
            return Err(e);
        }

        let timeout_ms = self.command_timeout();
        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                self.callbacks.lock().await.remove(&id);
                Err(Error::Timeout(format!(
                    "{} (id={}) got no response within {}ms",
                    method, id, timeout_ms
                )))
            }
        }
    }

    /// `session.new`
    pub async fn new_session(&self, capabilities: Value) -> Result<Value> {
        self.send_command(
            "session.new",
            serde_json::json!({ "capabilities": capabilities }),
        )
        .await
    }

    /// `session.end`
    pub async fn end_session(&self) -> Result<()> {
        self.send_command("session.end", serde_json::json!({}))
            .await
            .map(|_| ())
    }

    /// Closes the transport. Pending and later commands fail with
    /// [`Error::ChannelClosed`].
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.callbacks.lock().await.clear();
        self.sender.lock().await.close().await
    }

    /// Receive loop. Returns when the transport closes.
    pub async fn run(self: &Arc<Self>) {
        let transport_receiver = self.transport_receiver.lock().await.take();
        let message_rx = self.message_rx.lock().await.take();
        let (Some(mut transport_receiver), Some(mut message_rx)) =
            (transport_receiver, message_rx)
        else {
            tracing::error!("Connection::run() can only be called once");
            return;
        };

        let transport_handle = tokio::spawn(async move {
            if let Err(e) = transport_receiver.run().await {
                tracing::error!("Transport error: {}", e);
            }
        });

        while let Some(message_value) = message_rx.recv().await {
            self.handle_frame(message_value).await;
        }

        tracing::debug!("Message loop ended (transport closed)");
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the senders fails every waiting command with ChannelClosed
        self.callbacks.lock().await.clear();
        let _ = transport_handle.await;
    }

    async fn handle_frame(&self, frame: Value) {
        let message = match serde_json::from_value::<Message>(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Failed to parse message: {}", e);
                return;
            }
        };

        match message {
            Message::Success(response) => {
                self.complete(response.id, Ok(response.result)).await;
            }
            Message::Error(response) => match response.id {
                Some(id) => self.complete(id, Err(response)).await,
                None => tracing::error!(
                    "Remote error without command id: {}: {}",
                    response.error,
                    response.message
                ),
            },
            Message::Event(envelope) => {
                let dispatcher = self.dispatcher.read().as_ref().and_then(Weak::upgrade);
                match dispatcher {
                    Some(dispatcher) => dispatcher.process_envelope(envelope),
                    None => tracing::debug!("No dispatcher attached, dropping {}", envelope.method),
                }
            }
        }
    }

    async fn complete(&self, id: u32, outcome: std::result::Result<Value, ErrorResponse>) {
        let Some(pending) = self.callbacks.lock().await.remove(&id) else {
            tracing::warn!("Response for unknown command id={}", id);
            return;
        };

        tracing::debug!("Response for id={} ({})", id, pending.method);
        let result = outcome.map_err(|e| Error::RemoteError {
            command: pending.method,
            error: e.error,
            message: e.message,
        });
        let _ = pending.tx.send(result);
    }
}

impl SessionCommands for Connection {
    fn subscribe(
        &self,
        request: SubscriptionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SubscribeResult>> + Send + '_>> {
        Box::pin(async move {
            let params = serde_json::to_value(&request)?;
            let result = self.send_command("session.subscribe", params).await?;
            if result.is_null() {
                return Ok(SubscribeResult::default());
            }
            Ok(serde_json::from_value(result)?)
        })
    }

    fn unsubscribe(
        &self,
        request: UnsubscribeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let params = serde_json::to_value(&request)?;
            self.send_command("session.unsubscribe", params).await?;
            Ok(())
        })
    }
}
