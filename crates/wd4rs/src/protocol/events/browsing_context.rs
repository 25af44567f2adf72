// browsingContext module events
//
// See: https://w3c.github.io/webdriver-bidi/#module-browsingContext-events

use serde::{Deserialize, Serialize};

/// `browsingContext.Info`, carried by `contextCreated` / `contextDestroyed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    pub context: String,
    pub url: String,
    #[serde(default)]
    pub children: Option<Vec<ContextInfo>>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub user_context: Option<String>,
    #[serde(default)]
    pub original_opener: Option<String>,
    #[serde(default)]
    pub client_window: Option<String>,
}

/// `browsingContext.NavigationInfo`
///
/// Shared by `navigationStarted`, `navigationCommitted`, `navigationFailed`,
/// `navigationAborted`, `fragmentNavigated`, `domContentLoaded` and `load`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationInfo {
    pub context: String,
    #[serde(default)]
    pub navigation: Option<String>,
    pub timestamp: u64,
    pub url: String,
}

/// `browsingContext.downloadWillBegin` parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadWillBegin {
    #[serde(flatten)]
    pub navigation: NavigationInfo,
    pub suggested_filename: String,
}

/// `browsingContext.historyUpdated` parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryUpdated {
    pub context: String,
    #[serde(default)]
    pub timestamp: Option<u64>,
    pub url: String,
}

/// Kind of user prompt (dialog)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserPromptType {
    Alert,
    Beforeunload,
    Confirm,
    Prompt,
}

/// `browsingContext.userPromptOpened` parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPromptOpened {
    pub context: String,
    #[serde(rename = "type")]
    pub prompt_type: UserPromptType,
    pub message: String,
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
}

/// `browsingContext.userPromptClosed` parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPromptClosed {
    pub context: String,
    pub accepted: bool,
    #[serde(rename = "type")]
    pub prompt_type: UserPromptType,
    #[serde(default)]
    pub user_text: Option<String>,
}
