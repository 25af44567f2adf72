// Event envelope decoding and event mapping
//
// decode: raw frame -> (method, params)
// map:    (kind, params) -> BidiEvent
//
// Mapping either produces a complete typed event or a MapError that carries the
// raw payload; partially populated events never leave this module.

use crate::error::{Error, Result};
use crate::protocol::EventKind;
use crate::protocol::events::BidiEvent;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error as ThisError;

/// Why an event payload did not become a [`BidiEvent`].
#[derive(Debug, ThisError)]
pub enum MapError {
    /// Payload is missing a required field or has the wrong shape
    #[error("Malformed {kind} event: {reason}")]
    Malformed {
        kind: EventKind,
        reason: String,
        payload: Value,
    },

    /// Registered kind with no typed mapping
    #[error("No typed mapping for {0}")]
    Unsupported(EventKind),
}

impl From<MapError> for Error {
    fn from(err: MapError) -> Self {
        match err {
            MapError::Malformed {
                kind,
                reason,
                payload,
            } => Error::MalformedEvent {
                kind,
                reason,
                payload,
            },
            MapError::Unsupported(kind) => {
                Error::ProtocolError(format!("No typed mapping for {}", kind))
            }
        }
    }
}

/// An inbound event frame: `{"method": "<module>.<name>", "params": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl EventEnvelope {
    /// Decodes a raw frame. Fails only if `method` is missing or not a string.
    pub fn decode(frame: Value) -> Result<Self> {
        serde_json::from_value(frame)
            .map_err(|e| Error::ProtocolError(format!("Invalid event frame: {}", e)))
    }
}

fn decode<T: DeserializeOwned>(
    kind: EventKind,
    params: &Value,
) -> std::result::Result<T, MapError> {
    T::deserialize(params).map_err(|e| MapError::Malformed {
        kind,
        reason: e.to_string(),
        payload: params.clone(),
    })
}

/// Maps an event payload to its typed event.
pub fn map_event(kind: EventKind, params: &Value) -> std::result::Result<BidiEvent, MapError> {
    let event = match kind {
        EventKind::ContextCreated => BidiEvent::ContextCreated(decode(kind, params)?),
        EventKind::ContextDestroyed => BidiEvent::ContextDestroyed(decode(kind, params)?),
        EventKind::NavigationStarted => BidiEvent::NavigationStarted(decode(kind, params)?),
        EventKind::FragmentNavigated => BidiEvent::FragmentNavigated(decode(kind, params)?),
        EventKind::HistoryUpdated => BidiEvent::HistoryUpdated(decode(kind, params)?),
        EventKind::DomContentLoaded => BidiEvent::DomContentLoaded(decode(kind, params)?),
        EventKind::Load => BidiEvent::Load(decode(kind, params)?),
        EventKind::DownloadWillBegin => BidiEvent::DownloadWillBegin(decode(kind, params)?),
        EventKind::NavigationAborted => BidiEvent::NavigationAborted(decode(kind, params)?),
        EventKind::NavigationCommitted => BidiEvent::NavigationCommitted(decode(kind, params)?),
        EventKind::NavigationFailed => BidiEvent::NavigationFailed(decode(kind, params)?),
        EventKind::UserPromptClosed => BidiEvent::UserPromptClosed(decode(kind, params)?),
        EventKind::UserPromptOpened => BidiEvent::UserPromptOpened(decode(kind, params)?),
        EventKind::AuthRequired => BidiEvent::AuthRequired(decode(kind, params)?),
        EventKind::BeforeRequestSent => BidiEvent::BeforeRequestSent(decode(kind, params)?),
        EventKind::FetchError => BidiEvent::FetchError(decode(kind, params)?),
        EventKind::ResponseCompleted => BidiEvent::ResponseCompleted(decode(kind, params)?),
        EventKind::ResponseStarted => BidiEvent::ResponseStarted(decode(kind, params)?),
        EventKind::Message => BidiEvent::Message(decode(kind, params)?),
        EventKind::RealmCreated => BidiEvent::RealmCreated(decode(kind, params)?),
        EventKind::RealmDestroyed => BidiEvent::RealmDestroyed(decode(kind, params)?),
        EventKind::EntryAdded => BidiEvent::EntryAdded(decode(kind, params)?),
        EventKind::FileDialogOpened => BidiEvent::FileDialogOpened(decode(kind, params)?),
        // Download completion is subscribable but not modelled
        EventKind::DownloadEnd => return Err(MapError::Unsupported(kind)),
    };
    Ok(event)
}
