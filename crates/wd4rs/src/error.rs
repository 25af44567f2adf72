// Error types for wd4rs

use crate::protocol::EventKind;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for wd4rs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a WebDriver BiDi endpoint
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to establish connection with the remote end
    #[error("Failed to connect to BiDi endpoint: {0}")]
    ConnectionFailed(String),

    /// Transport-level error (WebSocket communication)
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Protocol-level error (unexpected frame shape, unknown command id, ...)
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The remote end answered a command with an error response
    ///
    /// `error` is the BiDi error code (e.g. "invalid argument", "no such frame"),
    /// `message` the human readable explanation sent by the browser.
    #[error("Remote error '{error}' for {command}: {message}")]
    RemoteError {
        command: String,
        error: String,
        message: String,
    },

    /// A remote `session.subscribe` / `session.unsubscribe` failed
    ///
    /// When returned from listener registration, the registration has been rolled
    /// back and no listener is active.
    #[error("Subscription to {events:?} failed: {source}")]
    SubscriptionFailed {
        events: Vec<String>,
        #[source]
        source: Box<Error>,
    },

    /// Event payload could not be decoded into the structure of its kind
    ///
    /// Carries the raw payload for diagnostics.
    #[error("Malformed {kind} event: {reason}")]
    MalformedEvent {
        kind: EventKind,
        reason: String,
        payload: Value,
    },

    /// Wire method is not part of the event registry
    #[error("Unknown event method: {0}")]
    UnknownEventKind(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Timeout waiting for operation
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Channel closed unexpectedly
    #[error("Channel closed unexpectedly")]
    ChannelClosed,

    /// Invalid argument provided to method
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Error with additional context
    #[error("{0}: {1}")]
    Context(String, #[source] Box<Error>),
}

impl Error {
    /// Adds context to the error
    pub fn context(self, msg: impl Into<String>) -> Self {
        Error::Context(msg.into(), Box::new(self))
    }

    /// Returns true if this error (or the error it wraps) came from a failed
    /// remote subscription.
    pub fn is_subscription_failure(&self) -> bool {
        match self {
            Error::SubscriptionFailed { .. } => true,
            Error::Context(_, inner) => inner.is_subscription_failure(),
            _ => false,
        }
    }
}
