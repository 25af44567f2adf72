//! wd4rs: WebDriver BiDi event dispatch and network correlation
//!
//! Connects to a BiDi endpoint over WebSocket, subscribes to events on demand
//! as listeners are registered, and assembles network events into
//! Playwright-style [`Request`] / [`Response`] objects.
//!
//! # Examples
//!
//! ## Listening for events
//!
//! ```ignore
//! use wd4rs::{BidiEvent, EventKind, Scope, Session, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::connect(
//!         "ws://127.0.0.1:9222/session",
//!         SessionOptions::new().capabilities(serde_json::json!({})),
//!     )
//!     .await?;
//!
//!     // First listener for a kind sends session.subscribe
//!     let handle = session
//!         .on(EventKind::EntryAdded, Scope::Global, |event| {
//!             if let BidiEvent::EntryAdded(entry) = event {
//!                 println!("console: {:?}", entry.text);
//!             }
//!             Ok(())
//!         })
//!         .await?;
//!
//!     // Last listener removed sends session.unsubscribe
//!     session.off(&handle).await?;
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Network requests
//!
//! ```ignore
//! use wd4rs::{Session, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::connect("ws://127.0.0.1:9222/session", SessionOptions::new()).await?;
//!
//!     session
//!         .on_request_finished(|request| {
//!             let status = request.response().map(|r| r.status());
//!             println!("{} {} -> {:?}", request.method(), request.url(), status);
//!             Ok(())
//!         })
//!         .await?;
//!     session
//!         .on_request_failed(|request| {
//!             println!("{} failed: {}", request.url(), request.failure());
//!             Ok(())
//!         })
//!         .await?;
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

// Internal modules (exposed for integration tests)
#[doc(hidden)]
pub mod server;

pub mod api;
mod error;
pub mod protocol;

/// Default timeout in milliseconds for BiDi commands.
pub use server::connection::DEFAULT_TIMEOUT_MS;

// Re-export error types
pub use error::{Error, Result};

// Re-export the session entry point
pub use protocol::Session;

// Re-export events and scopes
pub use protocol::{BidiEvent, EventKind, EventModule, Scope};

// Re-export network objects
pub use protocol::{HttpHeader, Request, RequestCorrelator, RequestPhase, Response};

// Re-export listener handles
pub use server::dispatcher::ListenerHandle;

// Re-export options
pub use api::{CorrelatorOptions, SessionOptions};
