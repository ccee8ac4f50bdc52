//! Service-account authentication for Google APIs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::GcpCredentials;
use crate::error::{GcpError, GcpResult};

/// Scope requested for all connector operations.
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Supplies bearer tokens for outbound API calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a currently-valid access token.
    async fn access_token(&self) -> GcpResult<String>;
}

/// JWT claims of the service-account assertion.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Token response from the OAuth2 endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: String,
}

/// Cached access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// True if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Token cache running the service-account JWT bearer flow.
///
/// Signs an RS256 assertion with the service account's private key,
/// exchanges it at the token endpoint, and caches the result until it
/// nears expiry.
#[derive(Debug)]
pub struct TokenCache {
    credentials: GcpCredentials,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// Grace period before expiry to trigger refresh (default: 5 minutes).
    grace_period: Duration,
}

impl TokenCache {
    /// Creates a new token cache.
    #[must_use]
    pub fn new(credentials: GcpCredentials) -> Self {
        Self {
            credentials,
            http_client: reqwest::Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
            grace_period: Duration::minutes(5),
        }
    }

    /// Acquires a new token with a signed assertion.
    #[instrument(skip(self))]
    async fn acquire_token(&self) -> GcpResult<CachedToken> {
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: &self.credentials.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.credentials.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };

        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.expose_secret().as_bytes())
            .map_err(|e| GcpError::Auth(format!("Invalid service-account key: {e}")))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| GcpError::Auth(format!("Failed to sign assertion: {e}")))?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.credentials.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| GcpError::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GcpError::Auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| GcpError::Auth(format!("Failed to parse token response: {e}")))?;

        let expires_at = now + Duration::seconds(token_response.expires_in);

        debug!(%expires_at, "Acquired new access token");

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    /// Invalidates the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}

#[async_trait]
impl TokenProvider for TokenCache {
    #[instrument(skip(self), fields(client_email = %self.credentials.client_email))]
    async fn access_token(&self) -> GcpResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    debug!("Using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("Refreshing access token");
        let new_token = self.acquire_token().await?;

        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }
}
