//! The status contract shared by the proxy endpoint and the poller.
//!
//! The proxy folds the store's free-form status strings into the closed
//! [`JobPhase`] enumeration, so the poller never matches on raw strings and
//! the two sides cannot drift apart.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized lifecycle phase of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// No record for the job identifier is visible yet.
    NotFound,
    /// The record exists but the job has not finished.
    Pending,
    /// The job finished and its result payload is available.
    Completed,
    /// The automation marked the job as failed.
    Failed,
}

impl JobPhase {
    /// Fold a free-form store status value into the closed contract.
    ///
    /// Unrecognized values fold to `Pending`, matching the store's own
    /// default for rows whose status column is still empty.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "completed" | "complete" | "done" | "success" | "finished" => JobPhase::Completed,
            "failed" | "error" => JobPhase::Failed,
            _ => JobPhase::Pending,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::NotFound => write!(f, "not_found"),
            JobPhase::Pending => write!(f, "pending"),
            JobPhase::Completed => write!(f, "completed"),
            JobPhase::Failed => write!(f, "failed"),
        }
    }
}

/// The proxy's answer for one status lookup.
///
/// Serialized with camelCase keys to match the endpoint's JSON contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub found: bool,
    pub status: JobPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusReport {
    /// The distinguished "no matching record" answer. Not an error: the
    /// job simply is not visible in the table yet.
    pub fn not_found() -> Self {
        Self {
            found: false,
            status: JobPhase::NotFound,
            record_id: None,
            job_id: None,
            result: None,
            created_time: None,
            last_modified_time: None,
            message: Some("job not yet visible in the task table".to_string()),
        }
    }
}

/// One topic suggestion from a finished job's result set.
///
/// Only the fields the ranking engine and the watch output care about are
/// named; everything else the automation writes is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Score rendered as "value/maxValue", e.g. "8.5/10".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<String>,
    /// Creation time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Parse the opaque result payload into topic results.
///
/// The automation writes the payload either as a JSON array or as a text
/// cell containing encoded JSON; anything else yields an empty set rather
/// than an error.
pub fn parse_results(payload: Option<&Value>) -> Vec<TopicResult> {
    match payload {
        Some(Value::String(text)) => serde_json::from_str(text).unwrap_or_default(),
        Some(value @ Value::Array(_)) => {
            serde_json::from_value(value.clone()).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}
