// input module events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `input.fileDialogOpened` parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDialogInfo {
    pub context: String,
    /// `script.SharedReference` of the `<input type=file>` element, when known
    #[serde(default)]
    pub element: Option<Value>,
    pub multiple: bool,
}
