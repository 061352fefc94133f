use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Structured error envelope returned by the Gemini API on non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiErrorBody {
    #[serde(rename = "error")]
    pub inner: GeminiErrorObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiErrorObject {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}
