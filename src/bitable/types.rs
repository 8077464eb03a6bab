//! Wire types for the store's open API.
//!
//! Upstream envelopes carry a `code`/`msg` pair; `code == 0` means success.
//! Field maps are free-form, so every expected column is pulled out through
//! [`field_str`] as an explicit optional scalar instead of being trusted to
//! have a particular shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of the credential exchange request.
#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    pub app_id: &'a str,
    pub app_secret: &'a str,
}

/// Response of the credential exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub tenant_access_token: Option<String>,
    /// Advertised token lifetime in seconds.
    #[serde(default)]
    pub expire: Option<i64>,
}

/// Envelope of the record query response.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordsResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<RecordsData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordsData {
    #[serde(default)]
    pub items: Option<Vec<TableRecord>>,
}

/// One row of the task table.
#[derive(Debug, Clone, Deserialize)]
pub struct TableRecord {
    pub record_id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_time: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub last_modified_time: Option<i64>,
}

/// Look up a field by name and coerce it to a string scalar.
///
/// Text cells arrive as plain strings, numbers, or rich-text segment arrays
/// of the form `[{"text": "..."}, ...]`; anything else is treated as absent.
pub fn field_str(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(segments) => {
            let joined: String = segments
                .iter()
                .filter_map(|segment| segment.get("text").and_then(Value::as_str))
                .collect();
            if joined.is_empty() { None } else { Some(joined) }
        }
        _ => None,
    }
}
