//! Configuration loaded from `topicwatch.toml`.
//!
//! The [`AppConfig`] struct contains all configurable parameters. Values
//! not present in the file use sensible defaults. The `LARK_*` environment
//! variables take precedence over the file for the store credentials and
//! field names, so deployments can keep secrets out of the config file.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use crate::error::StatusError;

/// Top-level configuration for both the proxy server and the watch command.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Identity of the store application.
    #[serde(default)]
    pub app_id: String,

    /// Secret paired with `app_id` for the credential exchange.
    #[serde(default)]
    pub app_secret: String,

    /// Shared URL of the task table; the app token and table id are
    /// extracted from it at request time.
    #[serde(default)]
    pub table_url: String,

    /// Column holding the job identifier.
    #[serde(default = "default_field_job_id")]
    pub field_job_id: String,

    /// Column holding the job status.
    #[serde(default = "default_field_status")]
    pub field_status: String,

    /// Column holding the result payload.
    #[serde(default = "default_field_result")]
    pub field_result: String,

    /// Milliseconds between poll attempts.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive request failures tolerated before a watch gives up.
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,

    /// Address the proxy server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_field_job_id() -> String {
    "jobId".to_string()
}

fn default_field_status() -> String {
    "status".to_string()
}

fn default_field_result() -> String {
    "result".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_max_errors() -> u32 {
    3
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            table_url: String::new(),
            field_job_id: default_field_job_id(),
            field_status: default_field_status(),
            field_result: default_field_result(),
            poll_interval_ms: default_poll_interval_ms(),
            max_errors: default_max_errors(),
            bind: default_bind(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the given path, falling back to defaults if
    /// the file does not exist, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<AppConfig>(&contents)?
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Environment variables take precedence over the configuration file.
    fn apply_env(&mut self) {
        override_from_env(&mut self.app_id, "LARK_APP_ID");
        override_from_env(&mut self.app_secret, "LARK_APP_SECRET");
        override_from_env(&mut self.table_url, "LARK_TABLE_URL");
        override_from_env(&mut self.field_job_id, "LARK_FIELD_JOB_ID");
        override_from_env(&mut self.field_status, "LARK_FIELD_STATUS");
        override_from_env(&mut self.field_result, "LARK_FIELD_RESULT");
    }

    /// Check that everything a store query needs is present.
    ///
    /// A failure here is a deployment fault, reported as [`StatusError::Config`]
    /// and never retried.
    pub fn validate_store(&self) -> Result<(), StatusError> {
        if self.app_id.is_empty() || self.app_secret.is_empty() || self.table_url.is_empty() {
            return Err(StatusError::Config(
                "app_id, app_secret and table_url must all be configured".into(),
            ));
        }
        Ok(())
    }
}

fn override_from_env(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var)
        && !value.is_empty()
    {
        *target = value;
    }
}
