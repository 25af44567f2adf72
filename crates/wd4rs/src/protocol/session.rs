// Session
//
// Owns one BiDi connection together with its event dispatcher, subscription
// manager and request correlator. Nothing is shared between sessions.
//
// Network callbacks (`on_request`, `on_response`, ...) sit on top of a
// correlator tap: the first network callback registers one global listener per
// network event that feeds the correlator, before the callback's own listener.
// The tap hands the correlator's Request/Response to the callbacks, so they see
// exactly what the correlator built, orphans included.

use crate::api::SessionOptions;
use crate::error::Result;
use crate::protocol::EventKind;
use crate::protocol::correlator::RequestCorrelator;
use crate::protocol::events::BidiEvent;
use crate::protocol::request::Request;
use crate::protocol::response::Response;
use crate::protocol::scope::Scope;
use crate::server::connection::Connection;
use crate::server::dispatcher::{EventDispatcher, ListenerHandle};
use crate::server::subscription::SubscriptionManager;
use crate::server::transport::WebSocketTransport;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;

/// A connected WebDriver BiDi session.
///
/// # Example
///
/// ```ignore
/// use wd4rs::{EventKind, Scope, Session, SessionOptions};
///
/// let session = Session::connect("ws://127.0.0.1:9222/session", SessionOptions::new()).await?;
/// session
///     .on_response(|response| {
///         println!("{} {}", response.status(), response.url());
///         Ok(())
///     })
///     .await?;
/// session
///     .on(EventKind::Load, Scope::context("ctx-1"), |event| {
///         println!("loaded: {:?}", event.context_id());
///         Ok(())
///     })
///     .await?;
/// ```
pub struct Session {
    connection: Arc<Connection>,
    dispatcher: Arc<EventDispatcher>,
    correlator: Arc<RequestCorrelator>,
    network_tap: TokioMutex<Option<Vec<ListenerHandle>>>,
    handoff: Arc<Handoff>,
    run_handle: Mutex<Option<JoinHandle<()>>>,
    session_id: Option<String>,
}

impl Session {
    /// Connects to a BiDi WebSocket endpoint.
    ///
    /// Sends `session.new` when [`SessionOptions::capabilities`] is set.
    pub async fn connect(url: &str, options: SessionOptions) -> Result<Self> {
        tracing::debug!("Connecting session to {}", url);
        let (transport, message_rx) =
            WebSocketTransport::connect(url, options.headers.clone()).await?;
        let (sender, receiver) = transport.into_parts();
        let connection = Arc::new(Connection::new(sender, receiver, message_rx));
        Self::from_connection(connection, options).await
    }

    /// Builds a session around an existing, not yet running connection.
    pub async fn from_connection(
        connection: Arc<Connection>,
        options: SessionOptions,
    ) -> Result<Self> {
        connection.set_command_timeout(options.resolved_command_timeout_ms());

        let subscriptions = Arc::new(SubscriptionManager::new(connection.clone()));
        let dispatcher = Arc::new(EventDispatcher::new(subscriptions));
        connection.attach_dispatcher(&dispatcher);

        let runner = connection.clone();
        let run_handle = tokio::spawn(async move { runner.run().await });

        let correlator = Arc::new(RequestCorrelator::new(
            options.correlator.clone().unwrap_or_default(),
        ));

        let mut session = Self {
            connection,
            dispatcher,
            correlator,
            network_tap: TokioMutex::new(None),
            handoff: Arc::new(Handoff::default()),
            run_handle: Mutex::new(Some(run_handle)),
            session_id: None,
        };

        if let Some(capabilities) = options.capabilities {
            let result = session
                .connection
                .new_session(capabilities)
                .await
                .map_err(|e| e.context("session.new failed"))?;
            session.session_id = result
                .get("sessionId")
                .and_then(Value::as_str)
                .map(str::to_string);
            tracing::debug!("Session created: {:?}", session.session_id);
        }

        Ok(session)
    }

    /// Id returned by `session.new`, if this session sent one.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn correlator(&self) -> &Arc<RequestCorrelator> {
        &self.correlator
    }

    /// Sends an arbitrary BiDi command.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        self.connection.send_command(method, params).await
    }

    /// Registers a listener for `kind` events within `scope`.
    ///
    /// The listener runs on the receive loop and must not block; hand long
    /// work to a task.
    pub async fn on<F>(&self, kind: EventKind, scope: Scope, listener: F) -> Result<ListenerHandle>
    where
        F: Fn(&BidiEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.add_listener(kind, scope, listener).await
    }

    /// Removes a listener registered with [`Session::on`] or one of the
    /// network callbacks.
    pub async fn off(&self, handle: &ListenerHandle) -> Result<bool> {
        self.dispatcher.remove_listener(handle).await
    }

    /// Called for every `network.beforeRequestSent` with the new Request.
    ///
    /// See: <https://playwright.dev/docs/api/class-page#page-event-request>
    pub async fn on_request<F>(&self, handler: F) -> Result<ListenerHandle>
    where
        F: Fn(Request) -> Result<()> + Send + Sync + 'static,
    {
        self.ensure_network_tap().await?;
        let handoff = self.handoff.clone();
        self.dispatcher
            .add_listener(EventKind::BeforeRequestSent, Scope::Global, move |event| {
                match handoff.request(event) {
                    Some(request) => handler(request),
                    None => Ok(()),
                }
            })
            .await
    }

    /// Called for every `network.responseStarted`.
    ///
    /// Responses to requests the session never saw are still delivered, with
    /// `response.request()` returning `None`.
    ///
    /// See: <https://playwright.dev/docs/api/class-page#page-event-response>
    pub async fn on_response<F>(&self, handler: F) -> Result<ListenerHandle>
    where
        F: Fn(Response) -> Result<()> + Send + Sync + 'static,
    {
        self.ensure_network_tap().await?;
        let handoff = self.handoff.clone();
        self.dispatcher
            .add_listener(EventKind::ResponseStarted, Scope::Global, move |event| {
                match handoff.response(event) {
                    Some(response) => handler(response),
                    None => Ok(()),
                }
            })
            .await
    }

    /// Called for every `network.responseCompleted` with the finished Request.
    ///
    /// See: <https://playwright.dev/docs/api/class-page#page-event-request-finished>
    pub async fn on_request_finished<F>(&self, handler: F) -> Result<ListenerHandle>
    where
        F: Fn(Request) -> Result<()> + Send + Sync + 'static,
    {
        self.ensure_network_tap().await?;
        let handoff = self.handoff.clone();
        self.dispatcher
            .add_listener(EventKind::ResponseCompleted, Scope::Global, move |event| {
                match handoff.response(event).and_then(|r| r.request()) {
                    Some(request) => handler(request),
                    None => {
                        tracing::debug!("Skipping requestfinished for untracked request");
                        Ok(())
                    }
                }
            })
            .await
    }

    /// Called for every `network.fetchError` with the failed Request.
    ///
    /// See: <https://playwright.dev/docs/api/class-page#page-event-request-failed>
    pub async fn on_request_failed<F>(&self, handler: F) -> Result<ListenerHandle>
    where
        F: Fn(Request) -> Result<()> + Send + Sync + 'static,
    {
        self.ensure_network_tap().await?;
        let handoff = self.handoff.clone();
        self.dispatcher
            .add_listener(EventKind::FetchError, Scope::Global, move |event| {
                match handoff.request(event) {
                    Some(request) => handler(request),
                    None => {
                        tracing::debug!("Skipping requestfailed for untracked request");
                        Ok(())
                    }
                }
            })
            .await
    }

    async fn ensure_network_tap(&self) -> Result<()> {
        let mut tap = self.network_tap.lock().await;
        if tap.is_some() {
            return Ok(());
        }

        let mut handles = Vec::new();
        let kinds = EventKind::NETWORK
            .into_iter()
            .chain(std::iter::once(EventKind::ContextDestroyed));

        for kind in kinds {
            let correlator = self.correlator.clone();
            let handoff = self.handoff.clone();
            let registered = self
                .dispatcher
                .add_listener(kind, Scope::Global, move |event| {
                    if let Some(outcome) = feed_correlator(&correlator, event) {
                        handoff.put(event, outcome);
                    }
                    Ok(())
                })
                .await;

            match registered {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in &handles {
                        if let Err(e) = self.dispatcher.remove_listener(handle).await {
                            tracing::warn!("Failed to roll back network tap: {}", e);
                        }
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!("Network tap installed ({} listeners)", handles.len());
        *tap = Some(handles);
        Ok(())
    }

    /// Removes every listener, releases every remote subscription, ends the
    /// BiDi session if this one created it and closes the transport.
    pub async fn close(&self) -> Result<()> {
        self.network_tap.lock().await.take();

        if let Err(e) = self.dispatcher.remove_all().await {
            tracing::warn!("Releasing subscriptions on close failed: {}", e);
        }
        self.correlator.clear();
        self.handoff.clear();

        if self.session_id.is_some() {
            if let Err(e) = self.connection.end_session().await {
                tracing::warn!("session.end failed: {}", e);
            }
        }

        let result = self.connection.close().await;
        if let Some(handle) = self.run_handle.lock().take() {
            handle.abort();
        }
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.run_handle.lock().take() {
            handle.abort();
        }
    }
}

/// What the correlator produced for one network event.
#[derive(Clone)]
enum Correlated {
    Request(Request),
    Response(Response),
    Untracked,
}

/// Passes the correlator's result for an event from the tap listener to the
/// network callbacks that run after it on the same event.
///
/// Dispatch is sequential, so one slot per event kind is enough; the request
/// id guards against reading a result left over from an earlier event.
#[derive(Default)]
struct Handoff {
    slots: Mutex<HashMap<EventKind, (String, Correlated)>>,
}

impl Handoff {
    fn put(&self, event: &BidiEvent, outcome: Correlated) {
        if let Some(base) = event.network_base() {
            self.slots
                .lock()
                .insert(event.kind(), (base.request_id().to_string(), outcome));
        }
    }

    fn get(&self, event: &BidiEvent) -> Option<Correlated> {
        let base = event.network_base()?;
        let slots = self.slots.lock();
        match slots.get(&event.kind()) {
            Some((id, outcome)) if id == base.request_id() => Some(outcome.clone()),
            _ => {
                tracing::debug!(
                    "No correlated result for {} {}",
                    event.kind(),
                    base.request_id()
                );
                None
            }
        }
    }

    fn request(&self, event: &BidiEvent) -> Option<Request> {
        match self.get(event)? {
            Correlated::Request(request) => Some(request),
            _ => None,
        }
    }

    fn response(&self, event: &BidiEvent) -> Option<Response> {
        match self.get(event)? {
            Correlated::Response(response) => Some(response),
            _ => None,
        }
    }

    fn clear(&self) {
        self.slots.lock().clear();
    }
}

fn feed_correlator(correlator: &RequestCorrelator, event: &BidiEvent) -> Option<Correlated> {
    let outcome = match event {
        BidiEvent::BeforeRequestSent(e) => {
            Correlated::Request(correlator.on_before_request_sent(e))
        }
        BidiEvent::ResponseStarted(e) => Correlated::Response(correlator.on_response_started(e)),
        BidiEvent::ResponseCompleted(e) => {
            Correlated::Response(correlator.on_response_completed(e))
        }
        BidiEvent::AuthRequired(e) => Correlated::Response(correlator.on_auth_required(e)),
        BidiEvent::FetchError(e) => correlator
            .on_fetch_error(e)
            .map_or(Correlated::Untracked, Correlated::Request),
        BidiEvent::ContextDestroyed(info) => {
            correlator.evict_context(&info.context);
            return None;
        }
        _ => return None,
    };
    Some(outcome)
}
