use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct ReconcileRequest {
    pub(crate) layout: Option<serde_json::Value>,
    pub(crate) read: Option<serde_json::Value>,
    pub(crate) fit: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
