// Options for Session::connect()
//
// Every field is optional; `None` means the documented default.

use crate::server::connection::DEFAULT_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default number of in-flight requests the correlator keeps
pub const DEFAULT_MAX_TRACKED_REQUESTS: usize = 10_000;

/// Default lifetime of a correlator entry, in milliseconds
pub const DEFAULT_REQUEST_TTL_MS: u64 = 300_000;

/// Options for connecting a [`Session`](crate::Session)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    /// Additional HTTP headers to send with the WebSocket handshake
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    /// Maximum time in milliseconds to wait for a command response
    /// (default: DEFAULT_TIMEOUT_MS)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_ms: Option<u64>,

    /// Capabilities for `session.new`. When unset no `session.new` is sent,
    /// which is what endpoints that hand out an already-created session expect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,

    /// Bounds for the request/response correlator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlator: Option<CorrelatorOptions>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set additional HTTP headers to send with the WebSocket handshake.
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Set the command timeout in milliseconds.
    pub fn command_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.command_timeout_ms = Some(timeout_ms);
        self
    }

    /// Send `session.new` with these capabilities after connecting.
    pub fn capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn correlator(mut self, correlator: CorrelatorOptions) -> Self {
        self.correlator = Some(correlator);
        self
    }

    pub(crate) fn resolved_command_timeout_ms(&self) -> u64 {
        self.command_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }
}

/// Bounds on the correlator's in-flight request table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatorOptions {
    /// Oldest entries are evicted beyond this many (default: 10 000)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,

    /// Entries older than this are evicted, in milliseconds (default: 300 000).
    /// 0 disables age-based eviction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

impl CorrelatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    pub(crate) fn resolved_max_entries(&self) -> usize {
        self.max_entries.unwrap_or(DEFAULT_MAX_TRACKED_REQUESTS).max(1)
    }

    pub(crate) fn resolved_ttl_ms(&self) -> u64 {
        self.ttl_ms.unwrap_or(DEFAULT_REQUEST_TTL_MS)
    }
}
