use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::AuthError;

/// Seconds subtracted from `expires_in` at cache time, so tokens are
/// refreshed ahead of their actual expiry.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// Time source for expiry checks. Production uses [`SystemClock`]; tests
/// inject a manually-advanced clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    /// Margin already subtracted; the token is valid while `now < expires_at`.
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Owns the client-credentials bearer token and its expiry. One instance is
/// shared by every executor; the cache lives for the process lifetime.
pub struct TokenManager {
    token_url: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self::with_clock(token_url, client_id, client_secret, http, Arc::new(SystemClock))
    }

    pub fn with_clock(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        http: reqwest::Client,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http,
            cache: Mutex::new(None),
            clock,
        }
    }

    /// Returns a currently-valid bearer token, refreshing if needed.
    ///
    /// The cache lock is held across the refresh, so concurrent callers at
    /// expiry share a single token request: the first one refreshes, the rest
    /// observe the fresh cache.
    pub async fn bearer_token(&self) -> Result<String, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if self.clock.now() < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    async fn request_token(&self) -> Result<CachedToken, AuthError> {
        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http
            .post(&self.token_url)
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if status != 200 {
            return Err(AuthError::Rejected { status, body });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(AuthError::Malformed)?;
        tracing::debug!(expires_in = parsed.expires_in, "fetched fresh access token");
        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: self.clock.now()
                + Duration::seconds(parsed.expires_in - EXPIRY_MARGIN_SECS),
        })
    }
}
