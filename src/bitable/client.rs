//! HTTP client for the store's open API.

use std::time::Duration;

use log::warn;
use reqwest::Client;

use super::query::TableLocation;
use super::token::TokenCache;
use super::types::{RecordsResponse, TableRecord, TokenRequest, TokenResponse};
use crate::error::StatusError;

const API_BASE: &str = "https://open.feishu.cn";
const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";

/// A freshly exchanged tenant token with its advertised lifetime in seconds.
#[derive(Debug, Clone)]
pub struct TenantToken {
    pub token: String,
    pub expires_in: i64,
}

pub struct BitableClient {
    app_id: String,
    app_secret: String,
    http: Client,
    base_url: String,
}

/// Outcome of one raw record query, before the token-refresh retry.
enum QueryFailure {
    /// The store rejected the access token.
    Unauthorized,
    Failed(StatusError),
}

impl QueryFailure {
    fn into_status(self) -> StatusError {
        match self {
            QueryFailure::Unauthorized => {
                StatusError::Auth("store rejected the access token".into())
            }
            QueryFailure::Failed(err) => err,
        }
    }
}

impl BitableClient {
    pub fn new(app_id: String, app_secret: String) -> Self {
        Self::with_base_url(app_id, app_secret, API_BASE.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(app_id: String, app_secret: String, base_url: String) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            app_id,
            app_secret,
            http,
            base_url,
        }
    }

    /// Exchange the configured identity pair for a tenant access token.
    pub async fn exchange_token(&self) -> Result<TenantToken, StatusError> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        let response = self
            .http
            .post(&url)
            .json(&TokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await
            .map_err(|e| StatusError::Auth(format!("token exchange request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatusError::Auth(format!(
                "token exchange returned HTTP {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| StatusError::Auth(format!("token exchange response unreadable: {e}")))?;

        if body.code != 0 {
            return Err(StatusError::Auth(format!(
                "token exchange rejected (code {}): {}",
                body.code, body.msg
            )));
        }

        match body.tenant_access_token {
            Some(token) if !token.is_empty() => Ok(TenantToken {
                token,
                expires_in: body.expire.unwrap_or(0),
            }),
            _ => Err(StatusError::Auth(
                "token exchange returned no usable token".into(),
            )),
        }
    }

    /// Query the table for records matching `filter`.
    ///
    /// A 401 from the store invalidates the cached token and retries once
    /// with a fresh one; any further rejection is surfaced.
    pub async fn query_records(
        &self,
        tokens: &TokenCache,
        location: &TableLocation,
        filter: &str,
    ) -> Result<Vec<TableRecord>, StatusError> {
        let token = tokens.get(self).await?;
        match self.fetch_records(&token, location, filter).await {
            Err(QueryFailure::Unauthorized) => {
                warn!("store rejected the cached token; refreshing once");
                tokens.invalidate().await;
                let token = tokens.get(self).await?;
                self.fetch_records(&token, location, filter)
                    .await
                    .map_err(QueryFailure::into_status)
            }
            other => other.map_err(QueryFailure::into_status),
        }
    }

    async fn fetch_records(
        &self,
        token: &str,
        location: &TableLocation,
        filter: &str,
    ) -> Result<Vec<TableRecord>, QueryFailure> {
        let url = format!(
            "{}/open-apis/bitables/v1/apps/{}/tables/{}/records",
            self.base_url, location.app_token, location.table_id
        );
        let response = self
            .http
            .get(&url)
            .query(&[("filter", filter)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                QueryFailure::Failed(StatusError::Query(format!("record query request failed: {e}")))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(QueryFailure::Unauthorized);
        }
        if !status.is_success() {
            return Err(QueryFailure::Failed(StatusError::Query(format!(
                "record query returned HTTP {status}"
            ))));
        }

        let body: RecordsResponse = response.json().await.map_err(|e| {
            QueryFailure::Failed(StatusError::Query(format!(
                "record query response unreadable: {e}"
            )))
        })?;

        if body.code != 0 {
            return Err(QueryFailure::Failed(StatusError::Query(format!(
                "record query rejected (code {}): {}",
                body.code, body.msg
            ))));
        }

        body.data
            .and_then(|data| data.items)
            .ok_or_else(|| {
                QueryFailure::Failed(StatusError::Query(
                    "record query response missing items".into(),
                ))
            })
    }
}
