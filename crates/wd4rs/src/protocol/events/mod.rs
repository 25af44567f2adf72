// Typed BiDi events
//
// One variant per mapped event kind. Events are immutable values decoded from a
// single frame; the dispatcher hands out `&BidiEvent` and keeps nothing after
// fan-out.

pub mod browsing_context;
pub mod input;
pub mod log;
pub mod network;
pub mod script;

pub use browsing_context::{
    ContextInfo, DownloadWillBegin, HistoryUpdated, NavigationInfo, UserPromptClosed,
    UserPromptOpened, UserPromptType,
};
pub use input::FileDialogInfo;
pub use log::{LogEntry, LogLevel};
pub use network::{BaseParameters, BeforeRequestSent, FetchError, ResponseParameters};
pub use script::{RealmDestroyed, RealmInfo, ScriptMessage};

use crate::protocol::EventKind;

/// A decoded WebDriver BiDi event.
#[derive(Debug, Clone, PartialEq)]
pub enum BidiEvent {
    ContextCreated(ContextInfo),
    ContextDestroyed(ContextInfo),
    NavigationStarted(NavigationInfo),
    FragmentNavigated(NavigationInfo),
    HistoryUpdated(HistoryUpdated),
    DomContentLoaded(NavigationInfo),
    Load(NavigationInfo),
    DownloadWillBegin(DownloadWillBegin),
    NavigationAborted(NavigationInfo),
    NavigationCommitted(NavigationInfo),
    NavigationFailed(NavigationInfo),
    UserPromptClosed(UserPromptClosed),
    UserPromptOpened(UserPromptOpened),
    AuthRequired(ResponseParameters),
    BeforeRequestSent(BeforeRequestSent),
    FetchError(FetchError),
    ResponseCompleted(ResponseParameters),
    ResponseStarted(ResponseParameters),
    Message(ScriptMessage),
    RealmCreated(RealmInfo),
    RealmDestroyed(RealmDestroyed),
    EntryAdded(LogEntry),
    FileDialogOpened(FileDialogInfo),
}

impl BidiEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BidiEvent::ContextCreated(_) => EventKind::ContextCreated,
            BidiEvent::ContextDestroyed(_) => EventKind::ContextDestroyed,
            BidiEvent::NavigationStarted(_) => EventKind::NavigationStarted,
            BidiEvent::FragmentNavigated(_) => EventKind::FragmentNavigated,
            BidiEvent::HistoryUpdated(_) => EventKind::HistoryUpdated,
            BidiEvent::DomContentLoaded(_) => EventKind::DomContentLoaded,
            BidiEvent::Load(_) => EventKind::Load,
            BidiEvent::DownloadWillBegin(_) => EventKind::DownloadWillBegin,
            BidiEvent::NavigationAborted(_) => EventKind::NavigationAborted,
            BidiEvent::NavigationCommitted(_) => EventKind::NavigationCommitted,
            BidiEvent::NavigationFailed(_) => EventKind::NavigationFailed,
            BidiEvent::UserPromptClosed(_) => EventKind::UserPromptClosed,
            BidiEvent::UserPromptOpened(_) => EventKind::UserPromptOpened,
            BidiEvent::AuthRequired(_) => EventKind::AuthRequired,
            BidiEvent::BeforeRequestSent(_) => EventKind::BeforeRequestSent,
            BidiEvent::FetchError(_) => EventKind::FetchError,
            BidiEvent::ResponseCompleted(_) => EventKind::ResponseCompleted,
            BidiEvent::ResponseStarted(_) => EventKind::ResponseStarted,
            BidiEvent::Message(_) => EventKind::Message,
            BidiEvent::RealmCreated(_) => EventKind::RealmCreated,
            BidiEvent::RealmDestroyed(_) => EventKind::RealmDestroyed,
            BidiEvent::EntryAdded(_) => EventKind::EntryAdded,
            BidiEvent::FileDialogOpened(_) => EventKind::FileDialogOpened,
        }
    }

    /// Browsing context the event belongs to, if it carries one.
    ///
    /// Script and log events carry it on their `source`; realm events only when
    /// the realm is a window realm.
    pub fn context_id(&self) -> Option<&str> {
        match self {
            BidiEvent::ContextCreated(info) | BidiEvent::ContextDestroyed(info) => {
                Some(&info.context)
            }
            BidiEvent::NavigationStarted(nav)
            | BidiEvent::FragmentNavigated(nav)
            | BidiEvent::DomContentLoaded(nav)
            | BidiEvent::Load(nav)
            | BidiEvent::NavigationAborted(nav)
            | BidiEvent::NavigationCommitted(nav)
            | BidiEvent::NavigationFailed(nav) => Some(&nav.context),
            BidiEvent::DownloadWillBegin(d) => Some(&d.navigation.context),
            BidiEvent::HistoryUpdated(h) => Some(&h.context),
            BidiEvent::UserPromptClosed(p) => Some(&p.context),
            BidiEvent::UserPromptOpened(p) => Some(&p.context),
            BidiEvent::FileDialogOpened(f) => Some(&f.context),
            BidiEvent::Message(m) => m.source.context.as_deref(),
            BidiEvent::RealmCreated(r) => r.context.as_deref(),
            BidiEvent::RealmDestroyed(_) => None,
            BidiEvent::EntryAdded(e) => e.source.context.as_deref(),
            _ => self.network_base().and_then(|b| b.context.as_deref()),
        }
    }

    /// JavaScript realm the event belongs to, if it carries one.
    pub fn realm_id(&self) -> Option<&str> {
        match self {
            BidiEvent::Message(m) => Some(&m.source.realm),
            BidiEvent::RealmCreated(r) => Some(&r.realm),
            BidiEvent::RealmDestroyed(r) => Some(&r.realm),
            BidiEvent::EntryAdded(e) => Some(&e.source.realm),
            _ => None,
        }
    }

    /// User context, for the events whose payload names one.
    pub fn user_context_id(&self) -> Option<&str> {
        match self {
            BidiEvent::ContextCreated(info) | BidiEvent::ContextDestroyed(info) => {
                info.user_context.as_deref()
            }
            _ => None,
        }
    }

    /// Shared network parameters, for the five network events.
    pub fn network_base(&self) -> Option<&BaseParameters> {
        match self {
            BidiEvent::BeforeRequestSent(e) => Some(&e.base),
            BidiEvent::FetchError(e) => Some(&e.base),
            BidiEvent::AuthRequired(e)
            | BidiEvent::ResponseCompleted(e)
            | BidiEvent::ResponseStarted(e) => Some(&e.base),
            _ => None,
        }
    }
}
