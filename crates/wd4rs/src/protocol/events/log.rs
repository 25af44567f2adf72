// log module events

use crate::protocol::types::Source;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// `log.Entry`, carried by `log.entryAdded`
///
/// `entry_type` is `"console"`, `"javascript"` or a browser specific value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub source: Source,
    #[serde(default)]
    pub text: Option<String>,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub stack_trace: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<Value>>,
}
