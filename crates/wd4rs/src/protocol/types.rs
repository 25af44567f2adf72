// Shared BiDi wire types
//
// Only the structures the event payloads carry. Required fields are the ones a
// request/response cannot be identified without; everything else defaults so
// that payloads from older browser builds still decode.
//
// See: https://w3c.github.io/webdriver-bidi/#module-network-definition

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `network.BytesValue`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum BytesValue {
    String(String),
    Base64(String),
}

impl BytesValue {
    /// Returns the value as text. Base64 values are returned undecoded.
    pub fn as_str(&self) -> &str {
        match self {
            BytesValue::String(s) | BytesValue::Base64(s) => s,
        }
    }
}

/// `network.Header`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: BytesValue,
}

/// A header with its name lower-cased, as exposed on Request/Response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

/// Lower-cases header names and flattens values to text, preserving order.
pub fn normalize_headers(headers: &[Header]) -> Vec<HttpHeader> {
    headers
        .iter()
        .map(|h| HttpHeader {
            name: h.name.to_ascii_lowercase(),
            value: h.value.as_str().to_string(),
        })
        .collect()
}

/// `network.RequestData`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    /// Wire request id, shared by every event of the same exchange
    pub request: String,
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub cookies: Vec<Value>,
    #[serde(default)]
    pub headers_size: u64,
    #[serde(default)]
    pub body_size: Option<u64>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub initiator_type: Option<String>,
    #[serde(default)]
    pub timings: Option<Value>,
}

/// `network.AuthChallenge`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub scheme: String,
    pub realm: String,
}

/// `network.ResponseContent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseContent {
    pub size: u64,
}

/// `network.ResponseData`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub from_cache: bool,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub bytes_received: u64,
    #[serde(default)]
    pub headers_size: Option<u64>,
    #[serde(default)]
    pub body_size: Option<u64>,
    #[serde(default)]
    pub content: Option<ResponseContent>,
    #[serde(default)]
    pub auth_challenges: Option<Vec<AuthChallenge>>,
}

/// `network.Initiator`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiator {
    #[serde(rename = "type", default)]
    pub initiator_type: Option<String>,
    #[serde(default)]
    pub column_number: Option<u64>,
    #[serde(default)]
    pub line_number: Option<u64>,
    #[serde(default)]
    pub request: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<Value>,
}

/// `script.Source`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub realm: String,
    #[serde(default)]
    pub context: Option<String>,
}
