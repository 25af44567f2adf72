// network module events
//
// All five events share `network.BaseParameters`; the response-bearing ones add
// `response`, `fetchError` adds `errorText`.
//
// See: https://w3c.github.io/webdriver-bidi/#module-network-events

use crate::protocol::types::{Initiator, RequestData, ResponseData};
use serde::{Deserialize, Serialize};

/// `network.BaseParameters`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseParameters {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub navigation: Option<String>,
    #[serde(default)]
    pub redirect_count: u64,
    pub request: RequestData,
    pub timestamp: u64,
    #[serde(default)]
    pub intercepts: Option<Vec<String>>,
}

impl BaseParameters {
    /// Wire request id of the exchange this event belongs to
    pub fn request_id(&self) -> &str {
        &self.request.request
    }
}

/// `network.beforeRequestSent` parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeforeRequestSent {
    #[serde(flatten)]
    pub base: BaseParameters,
    #[serde(default)]
    pub initiator: Option<Initiator>,
}

/// Parameters of `network.responseStarted`, `network.responseCompleted` and
/// `network.authRequired`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseParameters {
    #[serde(flatten)]
    pub base: BaseParameters,
    pub response: ResponseData,
}

/// `network.fetchError` parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchError {
    #[serde(flatten)]
    pub base: BaseParameters,
    pub error_text: String,
}
