// Event dispatcher
//
// Owns the listener registry for one session and fans decoded events out to
// it. Each kind moves Idle -> Active on its first listener (remote subscribe)
// and back to Idle when the last one is removed (remote unsubscribe).
//
// Dispatch runs synchronously on the connection's receive loop. Listener lists
// are copy-on-write so registration never blocks an in-progress fan-out; a
// fan-out always sees the list as it was when the frame arrived.

use crate::error::Result;
use crate::protocol::EventKind;
use crate::protocol::event_mapper::{EventEnvelope, MapError, map_event};
use crate::protocol::events::BidiEvent;
use crate::protocol::scope::Scope;
use crate::server::subscription::SubscriptionManager;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Listener callback. Returning an error (or panicking) is logged and does not
/// affect other listeners.
pub type Listener = Arc<dyn Fn(&BidiEvent) -> Result<()> + Send + Sync>;

#[derive(Clone)]
struct ListenerEntry {
    id: u64,
    scope: Scope,
    callback: Listener,
}

/// Opaque handle returned by registration, used to remove the listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    id: u64,
    kind: EventKind,
    scope: Scope,
}

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

/// Routes events to listeners registered by kind and scope.
pub struct EventDispatcher {
    listeners: RwLock<HashMap<EventKind, Arc<[ListenerEntry]>>>,
    subscriptions: Arc<SubscriptionManager>,
    last_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new(subscriptions: Arc<SubscriptionManager>) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            subscriptions,
            last_id: AtomicU64::new(0),
        }
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Registers `callback` for `kind` events within `scope`.
    ///
    /// Awaits the remote subscription first; if that fails the error is
    /// returned and no listener is registered.
    pub async fn add_listener<F>(
        &self,
        kind: EventKind,
        scope: Scope,
        callback: F,
    ) -> Result<ListenerHandle>
    where
        F: Fn(&BidiEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.add_listener_arc(kind, scope, Arc::new(callback)).await
    }

    pub async fn add_listener_arc(
        &self,
        kind: EventKind,
        scope: Scope,
        callback: Listener,
    ) -> Result<ListenerHandle> {
        let scope = scope.normalized();
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;

        self.subscriptions
            .ensure_subscribed(kind, &scope, id)
            .await?;

        let entry = ListenerEntry {
            id,
            scope: scope.clone(),
            callback,
        };

        {
            let mut listeners = self.listeners.write();
            let list = listeners
                .entry(kind)
                .or_insert_with(|| Arc::from(Vec::new()));
            let mut updated = list.to_vec();
            updated.push(entry);
            *list = Arc::from(updated);
        }

        tracing::debug!("Registered listener {} for {} ({:?})", id, kind, scope);
        Ok(ListenerHandle { id, kind, scope })
    }

    /// Removes the listener behind `handle`.
    ///
    /// Returns `Ok(false)` if it was already removed. When it was the last
    /// listener for its (kind, scope) the remote subscription is released; a
    /// failed remote unsubscribe is returned as an error but the listener is
    /// gone either way.
    pub async fn remove_listener(&self, handle: &ListenerHandle) -> Result<bool> {
        let removed = {
            let mut listeners = self.listeners.write();
            let remaining: Option<Vec<ListenerEntry>> = listeners
                .get(&handle.kind)
                .filter(|list| list.iter().any(|e| e.id == handle.id))
                .map(|list| list.iter().filter(|e| e.id != handle.id).cloned().collect());
            match remaining {
                Some(remaining) if remaining.is_empty() => {
                    listeners.remove(&handle.kind);
                    true
                }
                Some(remaining) => {
                    listeners.insert(handle.kind, Arc::from(remaining));
                    true
                }
                None => false,
            }
        };

        if !removed {
            tracing::debug!("Listener {} already removed", handle.id);
            return Ok(false);
        }

        tracing::debug!("Removed listener {} for {}", handle.id, handle.kind);
        self.subscriptions
            .release(handle.kind, &handle.scope, handle.id)
            .await?;
        Ok(true)
    }

    /// Removes every listener and releases every remote subscription.
    pub async fn remove_all(&self) -> Result<()> {
        let drained: Vec<(EventKind, Arc<[ListenerEntry]>)> =
            self.listeners.write().drain().collect();
        tracing::debug!("Removing listeners for {} event kinds", drained.len());
        self.subscriptions.release_all().await
    }

    /// Number of listeners registered for `kind`, across all scopes.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, |list| list.len())
    }

    /// Kinds with at least one listener.
    pub fn active_kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self.listeners.read().keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Handles one raw event frame. Every failure is logged and the frame
    /// dropped; nothing propagates to the receive loop.
    pub fn process_frame(&self, frame: Value) {
        match EventEnvelope::decode(frame) {
            Ok(envelope) => self.process_envelope(envelope),
            Err(e) => tracing::warn!("Dropping event frame: {}", e),
        }
    }

    pub fn process_envelope(&self, envelope: EventEnvelope) {
        let Some(kind) = EventKind::resolve(&envelope.method) else {
            tracing::info!("Unknown event method, dropping: {}", envelope.method);
            return;
        };

        let event = match map_event(kind, &envelope.params) {
            Ok(event) => event,
            Err(MapError::Malformed {
                kind,
                reason,
                payload,
            }) => {
                tracing::warn!(
                    "Malformed {} event dropped: {} payload={}",
                    kind,
                    reason,
                    payload
                );
                return;
            }
            Err(MapError::Unsupported(kind)) => {
                tracing::debug!("No typed mapping for {}, dropping", kind);
                return;
            }
        };

        self.dispatch(&event);
    }

    /// Invokes every listener registered for the event's kind whose scope
    /// matches, in registration order. Returns how many completed without
    /// error.
    pub fn dispatch(&self, event: &BidiEvent) -> usize {
        let kind = event.kind();
        let snapshot = self.listeners.read().get(&kind).cloned();

        let Some(listeners) = snapshot else {
            tracing::info!("No listener registered for {}", kind);
            return 0;
        };

        let mut delivered = 0;
        for entry in listeners.iter() {
            if !entry.scope.matches(event) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (entry.callback)(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::error!("Listener {} failed on {}: {}", entry.id, kind, e);
                }
                Err(panic) => {
                    tracing::error!(
                        "Listener {} panicked on {}: {}",
                        entry.id,
                        kind,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        delivered
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::server::subscription::test_support::MockCommands;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn dispatcher() -> (Arc<MockCommands>, EventDispatcher) {
        let mock = Arc::new(MockCommands::default());
        let manager = Arc::new(SubscriptionManager::new(mock.clone()));
        (mock, EventDispatcher::new(manager))
    }

    fn load_frame(ctx: &str, url: &str) -> Value {
        json!({
            "type": "event",
            "method": "browsingContext.load",
            "params": {"context": ctx, "navigation": "n", "timestamp": 1, "url": url}
        })
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&BidiEvent) -> Result<()> + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback = move |event: &BidiEvent| {
            if let BidiEvent::Load(nav) = event {
                sink.lock().push(nav.url.clone());
            }
            Ok(())
        };
        (seen, callback)
    }

    #[tokio::test]
    async fn test_events_delivered_in_wire_order() {
        let (_mock, dispatcher) = dispatcher();
        let (seen, callback) = recorder();
        dispatcher
            .add_listener(EventKind::Load, Scope::Global, callback)
            .await
            .unwrap();

        for url in ["https://1/", "https://2/", "https://3/"] {
            dispatcher.process_frame(load_frame("ctx-1", url));
        }

        assert_eq!(*seen.lock(), vec!["https://1/", "https://2/", "https://3/"]);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_fan_out() {
        let (_mock, dispatcher) = dispatcher();

        let first_seen = Arc::new(Mutex::new(Vec::new()));
        let sink = first_seen.clone();
        dispatcher
            .add_listener(EventKind::Load, Scope::Global, move |event| {
                let BidiEvent::Load(nav) = event else {
                    return Ok(());
                };
                if nav.url == "https://2/" {
                    return Err(Error::InvalidArgument("boom".to_string()));
                }
                sink.lock().push(nav.url.clone());
                Ok(())
            })
            .await
            .unwrap();

        let panicking = Arc::new(Mutex::new(0usize));
        let count = panicking.clone();
        dispatcher
            .add_listener(EventKind::Load, Scope::Global, move |_| {
                *count.lock() += 1;
                panic!("listener bug");
            })
            .await
            .unwrap();

        let (second_seen, callback) = recorder();
        dispatcher
            .add_listener(EventKind::Load, Scope::Global, callback)
            .await
            .unwrap();

        for url in ["https://1/", "https://2/", "https://3/"] {
            dispatcher.process_frame(load_frame("ctx-1", url));
        }

        assert_eq!(*first_seen.lock(), vec!["https://1/", "https://3/"]);
        assert_eq!(*panicking.lock(), 3);
        assert_eq!(
            *second_seen.lock(),
            vec!["https://1/", "https://2/", "https://3/"]
        );
    }

    #[tokio::test]
    async fn test_same_callback_twice_invoked_twice() {
        let (mock, dispatcher) = dispatcher();
        let (seen, callback) = recorder();
        let callback: Listener = Arc::new(callback);

        dispatcher
            .add_listener_arc(EventKind::Load, Scope::Global, callback.clone())
            .await
            .unwrap();
        dispatcher
            .add_listener_arc(EventKind::Load, Scope::Global, callback)
            .await
            .unwrap();

        dispatcher.process_frame(load_frame("ctx-1", "https://a/"));
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(mock.subscribe_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_listener_lifecycle() {
        let (mock, dispatcher) = dispatcher();
        let mut handles = Vec::new();
        for _ in 0..3 {
            handles.push(
                dispatcher
                    .add_listener(EventKind::Load, Scope::Global, |_| Ok(()))
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(mock.subscribe_count(), 1);
        assert_eq!(dispatcher.listener_count(EventKind::Load), 3);

        assert!(dispatcher.remove_listener(&handles[0]).await.unwrap());
        assert!(dispatcher.remove_listener(&handles[1]).await.unwrap());
        assert_eq!(mock.unsubscribe_count(), 0);

        assert!(dispatcher.remove_listener(&handles[2]).await.unwrap());
        assert_eq!(mock.unsubscribe_count(), 1);
        assert!(dispatcher.active_kinds().is_empty());

        // Second removal is a no-op
        assert!(!dispatcher.remove_listener(&handles[2]).await.unwrap());
        assert_eq!(mock.unsubscribe_count(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_failure_rolls_back_registration() {
        let (mock, dispatcher) = dispatcher();
        mock.fail_subscribe.store(true, Ordering::SeqCst);

        let err = dispatcher
            .add_listener(EventKind::FetchError, Scope::Global, |_| Ok(()))
            .await
            .unwrap_err();
        assert!(err.is_subscription_failure());
        assert_eq!(dispatcher.listener_count(EventKind::FetchError), 0);
        assert_eq!(dispatcher.subscriptions().subscription_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_listener_unknown_and_malformed_are_dropped() {
        let (_mock, dispatcher) = dispatcher();
        let (seen, callback) = recorder();
        dispatcher
            .add_listener(EventKind::Load, Scope::Global, callback)
            .await
            .unwrap();

        // Registered kind without listeners
        dispatcher.process_frame(json!({
            "method": "browsingContext.domContentLoaded",
            "params": {"context": "c", "navigation": "n", "timestamp": 1, "url": "u"}
        }));
        // Unknown method
        dispatcher.process_frame(json!({"method": "browsingContext.somethingNew", "params": {}}));
        // Missing required field
        dispatcher.process_frame(json!({
            "method": "browsingContext.load",
            "params": {"context": "c"}
        }));
        // Not an event frame at all
        dispatcher.process_frame(json!({"id": 3}));
        // Registered but unmapped
        dispatcher.process_frame(json!({"method": "browsingContext.downloadEnd", "params": {}}));

        assert!(seen.lock().is_empty());

        dispatcher.process_frame(load_frame("c", "https://ok/"));
        assert_eq!(*seen.lock(), vec!["https://ok/"]);
    }

    #[tokio::test]
    async fn test_scoped_listeners_only_see_their_context() {
        let (mock, dispatcher) = dispatcher();
        let (global, global_cb) = recorder();
        let (scoped, scoped_cb) = recorder();

        dispatcher
            .add_listener(EventKind::Load, Scope::Global, global_cb)
            .await
            .unwrap();
        dispatcher
            .add_listener(EventKind::Load, Scope::context("ctx-2"), scoped_cb)
            .await
            .unwrap();
        assert_eq!(mock.subscribe_count(), 2);

        dispatcher.process_frame(load_frame("ctx-1", "https://one/"));
        dispatcher.process_frame(load_frame("ctx-2", "https://two/"));

        assert_eq!(*global.lock(), vec!["https://one/", "https://two/"]);
        assert_eq!(*scoped.lock(), vec!["https://two/"]);
    }

    #[tokio::test]
    async fn test_realm_scoped_listener() {
        let (_mock, dispatcher) = dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        dispatcher
            .add_listener(EventKind::EntryAdded, Scope::realm("r1"), move |event| {
                if let BidiEvent::EntryAdded(entry) = event {
                    sink.lock().push(entry.text.clone().unwrap_or_default());
                }
                Ok(())
            })
            .await
            .unwrap();

        for (realm, text) in [("r1", "a"), ("r2", "b"), ("r1", "c")] {
            dispatcher.process_frame(json!({
                "method": "log.entryAdded",
                "params": {
                    "level": "info",
                    "source": {"realm": realm},
                    "text": text,
                    "timestamp": 1,
                    "type": "console"
                }
            }));
        }

        assert_eq!(*seen.lock(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_remove_all_releases_subscriptions() {
        let (mock, dispatcher) = dispatcher();
        dispatcher
            .add_listener(EventKind::Load, Scope::Global, |_| Ok(()))
            .await
            .unwrap();
        dispatcher
            .add_listener(EventKind::EntryAdded, Scope::Global, |_| Ok(()))
            .await
            .unwrap();

        dispatcher.remove_all().await.unwrap();
        assert!(dispatcher.active_kinds().is_empty());
        assert_eq!(mock.unsubscribe_count(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_snapshot_is_copy_on_write() {
        let (_mock, dispatcher) = dispatcher();
        let dispatcher = Arc::new(dispatcher);
        let calls = Arc::new(Mutex::new(0usize));

        let counter = calls.clone();
        dispatcher
            .add_listener(EventKind::Load, Scope::Global, move |_| {
                *counter.lock() += 1;
                Ok(())
            })
            .await
            .unwrap();

        // A snapshot held across registration keeps the old list
        let event = map_event(
            EventKind::Load,
            &json!({"context": "c", "navigation": "n", "timestamp": 1, "url": "u"}),
        )
        .unwrap();
        let listeners = dispatcher.listeners.read().get(&EventKind::Load).cloned();
        dispatcher
            .add_listener(EventKind::Load, Scope::Global, |_| Ok(()))
            .await
            .unwrap();
        assert_eq!(listeners.map(|l| l.len()), Some(1));
        assert_eq!(dispatcher.dispatch(&event), 2);
        assert_eq!(*calls.lock(), 1);
    }
}
