// Event name registry
//
// Closed enumeration of the WebDriver BiDi event methods this crate understands.
// The wire <-> kind mapping lives only here so that every method string maps
// to at most one kind.
//
// See: https://w3c.github.io/webdriver-bidi/#modules

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A WebDriver BiDi event kind.
///
/// Use [`EventKind::resolve`] to look up a wire method; unknown methods resolve
/// to `None` rather than an error so newer browsers can send events this crate
/// does not know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    // browsingContext
    ContextCreated,
    ContextDestroyed,
    NavigationStarted,
    FragmentNavigated,
    HistoryUpdated,
    DomContentLoaded,
    Load,
    DownloadWillBegin,
    DownloadEnd,
    NavigationAborted,
    NavigationCommitted,
    NavigationFailed,
    UserPromptClosed,
    UserPromptOpened,

    // network
    AuthRequired,
    BeforeRequestSent,
    FetchError,
    ResponseCompleted,
    ResponseStarted,

    // script
    Message,
    RealmCreated,
    RealmDestroyed,

    // log
    EntryAdded,

    // input
    FileDialogOpened,
}

/// BiDi module an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventModule {
    BrowsingContext,
    Network,
    Script,
    Log,
    Input,
}

impl EventModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventModule::BrowsingContext => "browsingContext",
            EventModule::Network => "network",
            EventModule::Script => "script",
            EventModule::Log => "log",
            EventModule::Input => "input",
        }
    }
}

impl EventKind {
    /// Every registered kind, in registry order.
    pub const ALL: [EventKind; 24] = [
        EventKind::ContextCreated,
        EventKind::ContextDestroyed,
        EventKind::NavigationStarted,
        EventKind::FragmentNavigated,
        EventKind::HistoryUpdated,
        EventKind::DomContentLoaded,
        EventKind::Load,
        EventKind::DownloadWillBegin,
        EventKind::DownloadEnd,
        EventKind::NavigationAborted,
        EventKind::NavigationCommitted,
        EventKind::NavigationFailed,
        EventKind::UserPromptClosed,
        EventKind::UserPromptOpened,
        EventKind::AuthRequired,
        EventKind::BeforeRequestSent,
        EventKind::FetchError,
        EventKind::ResponseCompleted,
        EventKind::ResponseStarted,
        EventKind::Message,
        EventKind::RealmCreated,
        EventKind::RealmDestroyed,
        EventKind::EntryAdded,
        EventKind::FileDialogOpened,
    ];

    /// The five network events the request/response correlator consumes.
    pub const NETWORK: [EventKind; 5] = [
        EventKind::BeforeRequestSent,
        EventKind::ResponseStarted,
        EventKind::ResponseCompleted,
        EventKind::FetchError,
        EventKind::AuthRequired,
    ];

    /// Returns the wire method name, e.g. `"network.beforeRequestSent"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ContextCreated => "browsingContext.contextCreated",
            EventKind::ContextDestroyed => "browsingContext.contextDestroyed",
            EventKind::NavigationStarted => "browsingContext.navigationStarted",
            EventKind::FragmentNavigated => "browsingContext.fragmentNavigated",
            EventKind::HistoryUpdated => "browsingContext.historyUpdated",
            EventKind::DomContentLoaded => "browsingContext.domContentLoaded",
            EventKind::Load => "browsingContext.load",
            EventKind::DownloadWillBegin => "browsingContext.downloadWillBegin",
            EventKind::DownloadEnd => "browsingContext.downloadEnd",
            EventKind::NavigationAborted => "browsingContext.navigationAborted",
            EventKind::NavigationCommitted => "browsingContext.navigationCommitted",
            EventKind::NavigationFailed => "browsingContext.navigationFailed",
            EventKind::UserPromptClosed => "browsingContext.userPromptClosed",
            EventKind::UserPromptOpened => "browsingContext.userPromptOpened",
            EventKind::AuthRequired => "network.authRequired",
            EventKind::BeforeRequestSent => "network.beforeRequestSent",
            EventKind::FetchError => "network.fetchError",
            EventKind::ResponseCompleted => "network.responseCompleted",
            EventKind::ResponseStarted => "network.responseStarted",
            EventKind::Message => "script.message",
            EventKind::RealmCreated => "script.realmCreated",
            EventKind::RealmDestroyed => "script.realmDestroyed",
            EventKind::EntryAdded => "log.entryAdded",
            EventKind::FileDialogOpened => "input.fileDialogOpened",
        }
    }

    /// Looks up the kind for a wire method name.
    ///
    /// Returns `None` for methods outside the registry. Never panics.
    pub fn resolve(method: &str) -> Option<EventKind> {
        let kind = match method {
            "browsingContext.contextCreated" => EventKind::ContextCreated,
            "browsingContext.contextDestroyed" => EventKind::ContextDestroyed,
            "browsingContext.navigationStarted" => EventKind::NavigationStarted,
            "browsingContext.fragmentNavigated" => EventKind::FragmentNavigated,
            "browsingContext.historyUpdated" => EventKind::HistoryUpdated,
            "browsingContext.domContentLoaded" => EventKind::DomContentLoaded,
            "browsingContext.load" => EventKind::Load,
            "browsingContext.downloadWillBegin" => EventKind::DownloadWillBegin,
            "browsingContext.downloadEnd" => EventKind::DownloadEnd,
            "browsingContext.navigationAborted" => EventKind::NavigationAborted,
            "browsingContext.navigationCommitted" => EventKind::NavigationCommitted,
            "browsingContext.navigationFailed" => EventKind::NavigationFailed,
            "browsingContext.userPromptClosed" => EventKind::UserPromptClosed,
            "browsingContext.userPromptOpened" => EventKind::UserPromptOpened,
            "network.authRequired" => EventKind::AuthRequired,
            "network.beforeRequestSent" => EventKind::BeforeRequestSent,
            "network.fetchError" => EventKind::FetchError,
            "network.responseCompleted" => EventKind::ResponseCompleted,
            "network.responseStarted" => EventKind::ResponseStarted,
            "script.message" => EventKind::Message,
            "script.realmCreated" => EventKind::RealmCreated,
            "script.realmDestroyed" => EventKind::RealmDestroyed,
            "log.entryAdded" => EventKind::EntryAdded,
            "input.fileDialogOpened" => EventKind::FileDialogOpened,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns the BiDi module this event is emitted by.
    pub fn module(&self) -> EventModule {
        match self {
            EventKind::AuthRequired
            | EventKind::BeforeRequestSent
            | EventKind::FetchError
            | EventKind::ResponseCompleted
            | EventKind::ResponseStarted => EventModule::Network,
            EventKind::Message | EventKind::RealmCreated | EventKind::RealmDestroyed => {
                EventModule::Script
            }
            EventKind::EntryAdded => EventModule::Log,
            EventKind::FileDialogOpened => EventModule::Input,
            _ => EventModule::BrowsingContext,
        }
    }

    /// Short human readable description of when the event fires.
    pub fn description(&self) -> &'static str {
        match self {
            EventKind::ContextCreated => "A tab, window or frame was created",
            EventKind::ContextDestroyed => "A tab, window or frame was closed",
            EventKind::NavigationStarted => "A navigation started",
            EventKind::FragmentNavigated => "Only the URL fragment changed",
            EventKind::HistoryUpdated => "Session history changed via pushState/replaceState",
            EventKind::DomContentLoaded => "The document was parsed",
            EventKind::Load => "The page finished loading, including subresources",
            EventKind::DownloadWillBegin => "A file download is about to start",
            EventKind::DownloadEnd => "A file download finished or was canceled",
            EventKind::NavigationAborted => "A started navigation was aborted",
            EventKind::NavigationCommitted => "A navigation was committed",
            EventKind::NavigationFailed => "A navigation failed",
            EventKind::UserPromptClosed => "An alert, confirm or prompt dialog was closed",
            EventKind::UserPromptOpened => "An alert, confirm or prompt dialog was opened",
            EventKind::AuthRequired => "The server requested HTTP authentication",
            EventKind::BeforeRequestSent => "A network request is about to be sent",
            EventKind::FetchError => "A network request failed",
            EventKind::ResponseCompleted => "A response body was fully received",
            EventKind::ResponseStarted => "Response headers were received",
            EventKind::Message => "A script channel posted a message",
            EventKind::RealmCreated => "A JavaScript realm was created",
            EventKind::RealmDestroyed => "A JavaScript realm was destroyed",
            EventKind::EntryAdded => "A console or JavaScript log entry was added",
            EventKind::FileDialogOpened => "A file chooser dialog was opened",
        }
    }

    pub fn is_network(&self) -> bool {
        self.module() == EventModule::Network
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::resolve(s).ok_or_else(|| Error::UnknownEventKind(s.to_string()))
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EventKind::resolve(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown event method '{}'", s)))
    }
}
