// Remote subscription bookkeeping
//
// One record per (event kind, remote scope). The first listener for a pair
// sends `session.subscribe`; the last one to leave sends `session.unsubscribe`.
// The bookkeeping lock is held across the remote round-trip so two concurrent
// registrations for the same pair cannot both subscribe.
//
// See: https://w3c.github.io/webdriver-bidi/#command-session-subscribe

use crate::error::{Error, Result};
use crate::protocol::EventKind;
use crate::protocol::scope::Scope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

/// The remote session commands the subscription manager needs.
pub trait SessionCommands: Send + Sync {
    /// Send `session.subscribe` and await the acknowledgement
    fn subscribe(
        &self,
        request: SubscriptionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<SubscribeResult>> + Send + '_>>;

    /// Send `session.unsubscribe` and await the acknowledgement
    fn unsubscribe(
        &self,
        request: UnsubscribeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// `session.SubscriptionRequest`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub events: Vec<EventKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_contexts: Option<Vec<String>>,
}

impl SubscriptionRequest {
    pub fn new(events: Vec<EventKind>, scope: &Scope) -> Self {
        let (contexts, user_contexts) = match scope.remote_scope() {
            Scope::BrowsingContexts(ids) => (Some(ids), None),
            Scope::UserContexts(ids) => (None, Some(ids)),
            Scope::Global | Scope::Realm(_) => (None, None),
        };
        Self {
            events,
            contexts,
            user_contexts,
        }
    }
}

/// `session.SubscribeResult`
///
/// Older remote ends answer with an empty result and no subscription id.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubscribeResult {
    #[serde(default)]
    pub subscription: Option<String>,
}

/// `session.UnsubscribeParameters`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UnsubscribeRequest {
    /// By the ids returned from `session.subscribe`
    ById { subscriptions: Vec<String> },
    /// Legacy form, by events and contexts
    ByAttributes(SubscriptionRequest),
}

#[derive(Debug)]
struct Record {
    refcount: usize,
    subscription: Option<String>,
}

/// Reference-counted remote subscriptions for one session.
pub struct SubscriptionManager {
    commands: Arc<dyn SessionCommands>,
    records: TokioMutex<HashMap<(EventKind, Scope), Record>>,
}

impl SubscriptionManager {
    pub fn new(commands: Arc<dyn SessionCommands>) -> Self {
        Self {
            commands,
            records: TokioMutex::new(HashMap::new()),
        }
    }

    /// Makes sure the remote end delivers `kind` events for `scope`, then
    /// counts `listener_id` as a user of that subscription.
    ///
    /// On failure nothing is recorded.
    pub async fn ensure_subscribed(
        &self,
        kind: EventKind,
        scope: &Scope,
        listener_id: u64,
    ) -> Result<()> {
        let key = (kind, scope.remote_scope());
        let mut records = self.records.lock().await;

        if let Some(record) = records.get_mut(&key) {
            record.refcount += 1;
            tracing::debug!(
                "Reusing subscription: kind={}, listener={}, refcount={}",
                kind,
                listener_id,
                record.refcount
            );
            return Ok(());
        }

        tracing::debug!(
            "Subscribing: kind={}, scope={:?}, listener={}",
            kind,
            key.1,
            listener_id
        );

        let request = SubscriptionRequest::new(vec![kind], &key.1);
        let result = self
            .commands
            .subscribe(request)
            .await
            .map_err(|e| Error::SubscriptionFailed {
                events: vec![kind.to_string()],
                source: Box::new(e),
            })?;

        tracing::debug!(
            "Subscribed: kind={}, subscription={:?}",
            kind,
            result.subscription
        );

        records.insert(
            key,
            Record {
                refcount: 1,
                subscription: result.subscription,
            },
        );
        Ok(())
    }

    /// Drops one user of the (kind, scope) subscription, unsubscribing
    /// remotely when it was the last.
    ///
    /// Releasing an untracked pair is a no-op. If the remote unsubscribe fails
    /// the local record is gone regardless and the error is returned.
    pub async fn release(&self, kind: EventKind, scope: &Scope, listener_id: u64) -> Result<()> {
        let key = (kind, scope.remote_scope());
        let mut records = self.records.lock().await;

        let Some(record) = records.get_mut(&key) else {
            tracing::warn!(
                "Release of untracked subscription: kind={}, scope={:?}, listener={}",
                kind,
                key.1,
                listener_id
            );
            return Ok(());
        };

        record.refcount = record.refcount.saturating_sub(1);
        if record.refcount > 0 {
            tracing::debug!(
                "Released listener {} for {}, refcount={}",
                listener_id,
                kind,
                record.refcount
            );
            return Ok(());
        }

        let Some(record) = records.remove(&key) else {
            return Ok(());
        };
        self.unsubscribe(kind, &key.1, record).await
    }

    /// Unsubscribes every tracked pair. Keeps going past failures and returns
    /// the first one.
    pub async fn release_all(&self) -> Result<()> {
        let mut records = self.records.lock().await;
        let mut first_error = None;

        for ((kind, scope), record) in records.drain() {
            if let Err(e) = self.unsubscribe(kind, &scope, record).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn unsubscribe(&self, kind: EventKind, scope: &Scope, record: Record) -> Result<()> {
        let request = match record.subscription {
            Some(id) => UnsubscribeRequest::ById {
                subscriptions: vec![id],
            },
            None => UnsubscribeRequest::ByAttributes(SubscriptionRequest::new(vec![kind], scope)),
        };

        tracing::debug!("Unsubscribing: kind={}, scope={:?}", kind, scope);

        self.commands.unsubscribe(request).await.map_err(|e| {
            tracing::warn!("Remote unsubscribe failed for {}: {}", kind, e);
            Error::SubscriptionFailed {
                events: vec![kind.to_string()],
                source: Box::new(e),
            }
        })
    }

    /// Number of listeners counted against (kind, scope).
    pub async fn refcount(&self, kind: EventKind, scope: &Scope) -> usize {
        self.records
            .lock()
            .await
            .get(&(kind, scope.remote_scope()))
            .map_or(0, |r| r.refcount)
    }

    /// Number of live remote subscriptions.
    pub async fn subscription_count(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Records every command and answers from flags.
    #[derive(Default)]
    pub(crate) struct MockCommands {
        pub subscribes: Mutex<Vec<SubscriptionRequest>>,
        pub unsubscribes: Mutex<Vec<UnsubscribeRequest>>,
        pub fail_subscribe: AtomicBool,
        pub fail_unsubscribe: AtomicBool,
        pub legacy: AtomicBool,
        next_id: AtomicU32,
    }

    impl MockCommands {
        pub fn subscribe_count(&self) -> usize {
            self.subscribes.lock().len()
        }

        pub fn unsubscribe_count(&self) -> usize {
            self.unsubscribes.lock().len()
        }
    }

    impl SessionCommands for MockCommands {
        fn subscribe(
            &self,
            request: SubscriptionRequest,
        ) -> Pin<Box<dyn Future<Output = Result<SubscribeResult>> + Send + '_>> {
            Box::pin(async move {
                self.subscribes.lock().push(request);
                if self.fail_subscribe.load(Ordering::SeqCst) {
                    return Err(Error::RemoteError {
                        command: "session.subscribe".to_string(),
                        error: "invalid argument".to_string(),
                        message: "rejected".to_string(),
                    });
                }
                if self.legacy.load(Ordering::SeqCst) {
                    return Ok(SubscribeResult::default());
                }
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                Ok(SubscribeResult {
                    subscription: Some(format!("sub-{}", id)),
                })
            })
        }

        fn unsubscribe(
            &self,
            request: UnsubscribeRequest,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.unsubscribes.lock().push(request);
                if self.fail_unsubscribe.load(Ordering::SeqCst) {
                    return Err(Error::Timeout("session.unsubscribe".to_string()));
                }
                Ok(())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MockCommands;
    use super::*;
    use std::sync::atomic::Ordering;

    fn manager() -> (Arc<MockCommands>, SubscriptionManager) {
        let mock = Arc::new(MockCommands::default());
        let manager = SubscriptionManager::new(mock.clone());
        (mock, manager)
    }

    #[tokio::test]
    async fn test_refcount_subscribes_once_and_unsubscribes_on_last() {
        let (mock, manager) = manager();
        let kind = EventKind::BeforeRequestSent;

        for id in 0..3 {
            manager
                .ensure_subscribed(kind, &Scope::Global, id)
                .await
                .unwrap();
        }
        assert_eq!(mock.subscribe_count(), 1);
        assert_eq!(manager.refcount(kind, &Scope::Global).await, 3);

        manager.release(kind, &Scope::Global, 0).await.unwrap();
        manager.release(kind, &Scope::Global, 1).await.unwrap();
        assert_eq!(mock.unsubscribe_count(), 0);

        manager.release(kind, &Scope::Global, 2).await.unwrap();
        assert_eq!(mock.unsubscribe_count(), 1);
        assert_eq!(
            mock.unsubscribes.lock()[0],
            UnsubscribeRequest::ById {
                subscriptions: vec!["sub-0".to_string()]
            }
        );
        assert_eq!(manager.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn test_scopes_are_tracked_separately() {
        let (mock, manager) = manager();
        let kind = EventKind::Load;

        manager
            .ensure_subscribed(kind, &Scope::Global, 1)
            .await
            .unwrap();
        manager
            .ensure_subscribed(kind, &Scope::context("ctx-1"), 2)
            .await
            .unwrap();
        // Realm scopes share the global remote subscription
        manager
            .ensure_subscribed(kind, &Scope::realm("r1"), 3)
            .await
            .unwrap();

        assert_eq!(mock.subscribe_count(), 2);
        assert_eq!(
            mock.subscribes.lock()[1].contexts,
            Some(vec!["ctx-1".to_string()])
        );
        assert_eq!(manager.refcount(kind, &Scope::Global).await, 2);
    }

    #[tokio::test]
    async fn test_subscribe_failure_records_nothing() {
        let (mock, manager) = manager();
        mock.fail_subscribe.store(true, Ordering::SeqCst);

        let err = manager
            .ensure_subscribed(EventKind::FetchError, &Scope::Global, 1)
            .await
            .unwrap_err();
        assert!(err.is_subscription_failure());
        assert_eq!(manager.subscription_count().await, 0);

        mock.fail_subscribe.store(false, Ordering::SeqCst);
        manager
            .ensure_subscribed(EventKind::FetchError, &Scope::Global, 2)
            .await
            .unwrap();
        assert_eq!(mock.subscribe_count(), 2);
        assert_eq!(manager.refcount(EventKind::FetchError, &Scope::Global).await, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_failure_still_clears_record() {
        let (mock, manager) = manager();
        mock.fail_unsubscribe.store(true, Ordering::SeqCst);

        manager
            .ensure_subscribed(EventKind::Load, &Scope::Global, 1)
            .await
            .unwrap();
        let err = manager
            .release(EventKind::Load, &Scope::Global, 1)
            .await
            .unwrap_err();
        assert!(err.is_subscription_failure());
        assert_eq!(manager.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_untracked_is_noop() {
        let (mock, manager) = manager();
        manager
            .release(EventKind::Load, &Scope::Global, 42)
            .await
            .unwrap();
        assert_eq!(mock.unsubscribe_count(), 0);
    }

    #[tokio::test]
    async fn test_legacy_unsubscribe_by_attributes() {
        let (mock, manager) = manager();
        mock.legacy.store(true, Ordering::SeqCst);
        let scope = Scope::context("ctx-1");

        manager
            .ensure_subscribed(EventKind::Load, &scope, 1)
            .await
            .unwrap();
        manager.release(EventKind::Load, &scope, 1).await.unwrap();

        let sent = serde_json::to_value(&mock.unsubscribes.lock()[0]).unwrap();
        assert_eq!(
            sent,
            serde_json::json!({"events": ["browsingContext.load"], "contexts": ["ctx-1"]})
        );
    }

    #[tokio::test]
    async fn test_concurrent_registration_subscribes_once() {
        let (mock, manager) = manager();
        let manager = Arc::new(manager);

        let mut handles = Vec::new();
        for id in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .ensure_subscribed(EventKind::ResponseCompleted, &Scope::Global, id)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(mock.subscribe_count(), 1);
        assert_eq!(
            manager
                .refcount(EventKind::ResponseCompleted, &Scope::Global)
                .await,
            8
        );
    }

    #[tokio::test]
    async fn test_release_all() {
        let (mock, manager) = manager();
        manager
            .ensure_subscribed(EventKind::Load, &Scope::Global, 1)
            .await
            .unwrap();
        manager
            .ensure_subscribed(EventKind::FetchError, &Scope::Global, 2)
            .await
            .unwrap();

        manager.release_all().await.unwrap();
        assert_eq!(mock.unsubscribe_count(), 2);
        assert_eq!(manager.subscription_count().await, 0);
    }

    #[test]
    fn test_subscription_request_wire_shape() {
        let request = SubscriptionRequest::new(
            vec![EventKind::BeforeRequestSent],
            &Scope::user_contexts(["uc-1"]),
        );
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "events": ["network.beforeRequestSent"],
                "userContexts": ["uc-1"]
            })
        );
    }
}
