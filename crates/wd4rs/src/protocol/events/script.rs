// script module events

use crate::protocol::types::Source;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `script.message` parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptMessage {
    pub channel: String,
    /// `script.RemoteValue`, kept as JSON
    pub data: Value,
    pub source: Source,
}

/// `script.RealmInfo`, carried by `script.realmCreated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmInfo {
    pub realm: String,
    pub origin: String,
    #[serde(rename = "type")]
    pub realm_type: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub sandbox: Option<String>,
}

/// `script.realmDestroyed` parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmDestroyed {
    pub realm: String,
}
