// Listener / subscription scope
//
// BiDi `session.subscribe` accepts either browsing context ids or user context
// ids (or neither, meaning global). Realm scopes have no remote form: they are
// subscribed globally and narrowed locally by the dispatcher.

use crate::protocol::events::BidiEvent;
use serde::{Deserialize, Serialize};

/// Which events of a kind a listener wants to see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    /// Every event of the kind
    #[default]
    Global,
    /// Events whose browsing context is one of these ids (exact match, child
    /// frames are not included)
    BrowsingContexts(Vec<String>),
    /// Events from browsing contexts belonging to one of these user contexts
    UserContexts(Vec<String>),
    /// Events emitted from one JavaScript realm
    Realm(String),
}

impl Scope {
    /// Scope for a single browsing context.
    pub fn context(id: impl Into<String>) -> Self {
        Scope::BrowsingContexts(vec![id.into()])
    }

    pub fn contexts<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Scope::BrowsingContexts(ids.into_iter().map(Into::into).collect()).normalized()
    }

    pub fn user_contexts<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Scope::UserContexts(ids.into_iter().map(Into::into).collect()).normalized()
    }

    pub fn realm(id: impl Into<String>) -> Self {
        Scope::Realm(id.into())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// Sorts and de-duplicates id lists so equal sets compare and hash equal.
    /// An empty id list is treated as global.
    pub fn normalized(self) -> Self {
        match self {
            Scope::BrowsingContexts(ids) => match sorted(ids) {
                Some(ids) => Scope::BrowsingContexts(ids),
                None => Scope::Global,
            },
            Scope::UserContexts(ids) => match sorted(ids) {
                Some(ids) => Scope::UserContexts(ids),
                None => Scope::Global,
            },
            other => other,
        }
    }

    /// The scope as the remote end understands it.
    pub fn remote_scope(&self) -> Scope {
        match self {
            Scope::Realm(_) => Scope::Global,
            other => other.clone().normalized(),
        }
    }

    /// Whether a listener with this scope should receive `event`.
    ///
    /// Only the context-creation events name their user context. For other
    /// events a user-context scope relies on the remote end having filtered
    /// them, so they are accepted here.
    pub fn matches(&self, event: &BidiEvent) -> bool {
        match self {
            Scope::Global => true,
            Scope::BrowsingContexts(ids) => event
                .context_id()
                .is_some_and(|ctx| ids.iter().any(|id| id == ctx)),
            Scope::UserContexts(ids) => match event.user_context_id() {
                Some(uc) => ids.iter().any(|id| id == uc),
                None => true,
            },
            Scope::Realm(realm) => event.realm_id() == Some(realm.as_str()),
        }
    }
}

fn sorted(mut ids: Vec<String>) -> Option<Vec<String>> {
    ids.sort();
    ids.dedup();
    if ids.is_empty() { None } else { Some(ids) }
}
