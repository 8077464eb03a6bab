//! Store location parsing and filter construction.

use url::Url;

use crate::error::StatusError;

/// Fixed prefix of the app-scoped token segment in a shared table URL.
const APP_TOKEN_PREFIX: &str = "bascn";

/// Query parameter naming the table within the app.
const TABLE_PARAM: &str = "table";

/// Where the task table lives: the app token from the URL path and the
/// table id from its query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLocation {
    pub app_token: String,
    pub table_id: String,
}

impl TableLocation {
    /// Extract the app token and table id from a shared table URL, e.g.
    /// `https://example.feishu.cn/base/bascnAbCdEf?table=tblXyZ&view=vewQ`.
    pub fn parse(table_url: &str) -> Result<Self, StatusError> {
        let parsed = Url::parse(table_url)
            .map_err(|e| StatusError::Config(format!("table URL is not a valid URL: {e}")))?;

        let app_token = parsed
            .path_segments()
            .and_then(|mut segments| {
                segments.find(|segment| segment.starts_with(APP_TOKEN_PREFIX))
            })
            .map(str::to_string)
            .ok_or_else(|| {
                StatusError::Config("table URL does not contain an app token segment".into())
            })?;

        let table_id = parsed
            .query_pairs()
            .find(|(key, _)| key == TABLE_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| StatusError::Config("table URL does not name a table".into()))?;

        Ok(Self {
            app_token,
            table_id,
        })
    }
}

/// Build an exact-match filter expression for a job identifier.
///
/// The identifier comes from the request and is untrusted; backslashes and
/// double quotes are escaped so the value cannot terminate the string
/// literal and smuggle extra filter clauses.
pub fn build_filter(field: &str, job_id: &str) -> String {
    format!("CurrentValue.['{field}']=\"{}\"", escape_literal(job_id))
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
