//! Authenticated HTTP client for Google APIs.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::auth::TokenProvider;
use crate::config::API_CALL_TIMEOUT;
use crate::error::{GcpError, GcpResult};

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

/// Error body of the envelope.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Thin authenticated wrapper over `reqwest`.
///
/// Every call carries a bearer token and the fixed per-call timeout. No
/// retries happen at this layer; failures are mapped to [`GcpError`] once
/// and surfaced to the caller.
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    token_provider: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client with the fixed per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token_provider: Arc<dyn TokenProvider>) -> GcpResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(API_CALL_TIMEOUT)
            .build()
            .map_err(|e| GcpError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            token_provider,
        })
    }

    /// Performs a GET request.
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> GcpResult<T> {
        let token = self.token_provider.access_token().await?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Performs a POST request with a JSON body.
    #[instrument(skip(self, body))]
    pub async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> GcpResult<T> {
        let token = self.token_provider.access_token().await?;
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Performs a PATCH request with a JSON body.
    #[instrument(skip(self, body))]
    pub async fn patch<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> GcpResult<T> {
        let token = self.token_provider.access_token().await?;
        let response = self
            .http_client
            .patch(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Performs a DELETE request; tolerates an empty response body.
    #[instrument(skip(self))]
    pub async fn delete(&self, url: &str) -> GcpResult<()> {
        let token = self.token_provider.access_token().await?;
        let response = self
            .http_client
            .delete(url)
            .bearer_auth(&token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::map_error(status, response.text().await.unwrap_or_default()))
    }

    /// Decodes a success body or maps the error envelope.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> GcpResult<T> {
        let status = response.status();
        if status.is_success() {
            debug!(%status, "API call succeeded");
            return response.json().await.map_err(GcpError::from);
        }
        Err(Self::map_error(status, response.text().await.unwrap_or_default()))
    }

    fn map_error(status: reqwest::StatusCode, body: String) -> GcpError {
        if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(&body) {
            return GcpError::Api {
                code: envelope.error.code.max(status.as_u16()),
                status: envelope.error.status,
                message: envelope.error.message,
            };
        }
        GcpError::Api {
            code: status.as_u16(),
            status: status
                .canonical_reason()
                .unwrap_or("UNKNOWN")
                .to_uppercase()
                .replace(' ', "_"),
            message: body,
        }
    }
}
