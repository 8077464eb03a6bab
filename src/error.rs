use thiserror::Error;

/// Failure classes for a task-status lookup.
///
/// Each class maps to one HTTP status and one stable caller-facing message;
/// upstream detail is carried in the variant payload for logging only.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("missing jobId parameter")]
    MissingParameter,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("credential exchange failed: {0}")]
    Auth(String),

    #[error("store query failed: {0}")]
    Query(String),
}

impl StatusError {
    /// HTTP status code the proxy responds with for this class.
    pub fn http_status(&self) -> u16 {
        match self {
            StatusError::MissingParameter => 400,
            StatusError::Config(_) | StatusError::Auth(_) | StatusError::Query(_) => 500,
        }
    }

    /// Stable message returned to callers. Upstream bodies never travel
    /// through here; they go to the log instead.
    pub fn public_message(&self) -> &'static str {
        match self {
            StatusError::MissingParameter => "missing jobId parameter",
            StatusError::Config(_) => "store configuration is incomplete or malformed",
            StatusError::Auth(_) => "failed to obtain store access credentials",
            StatusError::Query(_) => "failed to query the task table",
        }
    }
}
