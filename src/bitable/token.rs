//! Tenant access token cache.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::client::BitableClient;
use crate::error::StatusError;

/// Safety margin subtracted from the advertised token lifetime so a token
/// is never used right at its expiry boundary.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Process-wide cache for the store's tenant access token.
///
/// Callers serialize on the inner mutex for the whole refresh, so N
/// concurrent requests with a cold or expired cache trigger exactly one
/// exchange and all observe the same freshly cached token.
#[derive(Debug, Default)]
pub struct TokenCache {
    inner: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Return the cached token, refreshing through `client` when the cache
    /// is cold or the token has expired.
    pub async fn get(&self, client: &BitableClient) -> Result<String, StatusError> {
        let mut guard = self.inner.lock().await;

        if let Some(cached) = guard.as_ref()
            && cached.expires_at > Instant::now()
        {
            return Ok(cached.token.clone());
        }

        let fresh = client.exchange_token().await?;
        let lifetime = Duration::from_secs(fresh.expires_in.max(0) as u64);
        let expires_at = Instant::now() + lifetime.saturating_sub(EXPIRY_SKEW);
        let token = fresh.token.clone();
        *guard = Some(CachedToken {
            token: fresh.token,
            expires_at,
        });
        Ok(token)
    }

    /// Drop the cached token so the next [`get`](Self::get) performs a
    /// fresh exchange. Called when the store rejects the token.
    pub async fn invalidate(&self) {
        *self.inner.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";

    fn token_body(token: &str, expire: i64) -> serde_json::Value {
        serde_json::json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": token,
            "expire": expire
        })
    }

    async fn client_for(server: &MockServer) -> BitableClient {
        BitableClient::with_base_url("cli_id".into(), "secret".into(), server.uri())
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("t-abc", 7200)))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(client_for(&server).await);
        let cache = Arc::new(TokenCache::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let client = Arc::clone(&client);
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(
                async move { cache.get(&client).await.unwrap() },
            ));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "t-abc");
        }
    }

    #[tokio::test]
    async fn cached_token_is_reused_until_invalidated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("t-live", 7200)))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cache = TokenCache::new();

        assert_eq!(cache.get(&client).await.unwrap(), "t-live");
        assert_eq!(cache.get(&client).await.unwrap(), "t-live");

        cache.invalidate().await;
        assert_eq!(cache.get(&client).await.unwrap(), "t-live");
    }

    #[tokio::test]
    async fn expired_token_triggers_a_new_exchange() {
        let server = MockServer::start().await;
        // An advertised lifetime below the skew expires immediately.
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("t-short", 1)))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cache = TokenCache::new();
        cache.get(&client).await.unwrap();
        cache.get(&client).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_exchange_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 99991663,
                "msg": "app secret invalid"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cache = TokenCache::new();
        let err = cache.get(&client).await.unwrap_err();
        assert!(matches!(err, StatusError::Auth(_)));
    }
}
