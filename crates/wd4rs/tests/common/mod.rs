// Shared test helpers
//
// - init_tracing(): honour RUST_LOG in test output
// - MockBidiServer: a one-connection WebSocket server that answers BiDi
//   session commands and pushes events on demand

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Waits for the next value on `rx`, failing the test after two seconds.
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for value")
        .expect("channel closed")
}

pub struct MockBidiServer {
    pub url: String,
    commands: Arc<Mutex<Vec<Value>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    events_tx: mpsc::UnboundedSender<Value>,
    task: JoinHandle<()>,
}

impl MockBidiServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let commands = Arc::new(Mutex::new(Vec::new()));
        let failing = Arc::new(Mutex::new(HashSet::new()));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Value>();

        let recorded = commands.clone();
        let fail_set = failing.clone();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let mut next_subscription = 0u32;

            loop {
                tokio::select! {
                    incoming = ws.next() => {
                        let Some(Ok(msg)) = incoming else { break };
                        let text = match msg {
                            WsMessage::Text(text) => text,
                            WsMessage::Close(_) => break,
                            _ => continue,
                        };
                        let command: Value = serde_json::from_str(&text).unwrap();
                        recorded.lock().unwrap().push(command.clone());

                        let id = command["id"].clone();
                        let method = command["method"].as_str().unwrap_or_default().to_string();
                        let reply = if fail_set.lock().unwrap().contains(&method) {
                            json!({
                                "type": "error",
                                "id": id,
                                "error": "invalid argument",
                                "message": format!("{} rejected by mock", method),
                                "stacktrace": ""
                            })
                        } else {
                            let result = match method.as_str() {
                                "session.subscribe" => {
                                    next_subscription += 1;
                                    json!({"subscription": format!("sub-{}", next_subscription)})
                                }
                                "session.new" => json!({
                                    "sessionId": "mock-session",
                                    "capabilities": {"browserName": "mock"}
                                }),
                                _ => json!({}),
                            };
                            json!({"type": "success", "id": id, "result": result})
                        };
                        if ws.send(WsMessage::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    event = events_rx.recv() => {
                        let Some(frame) = event else { break };
                        if ws.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            url: format!("ws://{}", addr),
            commands,
            failing,
            events_tx,
            task,
        }
    }

    /// Pushes `{"type": "event", "method": ..., "params": ...}` to the client.
    pub fn send_event(&self, method: &str, params: Value) {
        self.send_raw(json!({"type": "event", "method": method, "params": params}));
    }

    pub fn send_raw(&self, frame: Value) {
        self.events_tx.send(frame).unwrap();
    }

    /// Answer every later `method` command with an error.
    pub fn fail(&self, method: &str) {
        self.failing.lock().unwrap().insert(method.to_string());
    }

    pub fn commands(&self) -> Vec<Value> {
        self.commands.lock().unwrap().clone()
    }

    pub fn commands_named(&self, method: &str) -> Vec<Value> {
        self.commands()
            .into_iter()
            .filter(|c| c["method"] == method)
            .collect()
    }
}

impl Drop for MockBidiServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn request_params(id: &str, url: &str, context: &str) -> Value {
    json!({
        "context": context,
        "isBlocked": false,
        "navigation": null,
        "redirectCount": 0,
        "request": {
            "request": id,
            "url": url,
            "method": "GET",
            "headers": [{"name": "Accept", "value": {"type": "string", "value": "text/html"}}],
            "cookies": [],
            "headersSize": 0,
            "bodySize": 0,
            "destination": "",
            "initiatorType": null,
            "timings": {}
        },
        "timestamp": 1700000000000u64
    })
}

pub fn response_params(id: &str, url: &str, context: &str, status: u16) -> Value {
    let mut params = request_params(id, url, context);
    params["response"] = json!({
        "url": url,
        "protocol": "http/1.1",
        "status": status,
        "statusText": "",
        "fromCache": false,
        "headers": [{"name": "Content-Type", "value": {"type": "string", "value": "text/html"}}],
        "mimeType": "text/html",
        "bytesReceived": 10,
        "headersSize": 10,
        "bodySize": 0,
        "content": {"size": 0}
    });
    params
}
