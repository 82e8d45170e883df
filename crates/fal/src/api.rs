//! REST client for the fal.ai queue HTTP endpoints.
//!
//! Wraps job submission, status polling and result retrieval using
//! [`reqwest`]. Requests authenticate with `Authorization: Key <key>`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use mediaforge_core::endpoints::{QueueUrls, StatusRoute};
use reqwest::header::AUTHORIZATION;

use crate::error::QueueError;
use crate::status::{parse_status, QueueStatus, SubmitResponse};
use crate::transport::QueueTransport;

/// HTTP client for the fal.ai queue.
pub struct FalApi {
    client: reqwest::Client,
    api_key: String,
    urls: QueueUrls,
}

impl fmt::Debug for FalApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FalApi")
            .field("base_url", &self.urls.base_url())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl FalApi {
    /// Create a client with its own connection pool.
    ///
    /// * `api_key`  - fal.ai key, sent as `Authorization: Key {api_key}`.
    /// * `base_url` - queue base URL, e.g. `https://queue.fal.run`.
    /// * `timeout`  - per-request timeout.
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, QueueError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, api_key, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_key: String, base_url: &str) -> Self {
        Self {
            client,
            api_key,
            urls: QueueUrls::new(base_url),
        }
    }

    pub fn urls(&self) -> &QueueUrls {
        &self.urls
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or a
    /// [`QueueError::Http`] carrying the status and body on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, QueueError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(QueueError::from_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, QueueError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl QueueTransport for FalApi {
    async fn submit(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<SubmitResponse, QueueError> {
        let response = self
            .client
            .post(self.urls.submit_url(endpoint))
            .header(AUTHORIZATION, self.auth_header())
            .json(payload)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::info!(
            endpoint,
            request_id = %submitted.request_id,
            queue_position = submitted.queue_position,
            "Job submitted to fal.ai queue",
        );
        Ok(submitted)
    }

    async fn status(&self, endpoint: &str, request_id: &str) -> Result<QueueStatus, QueueError> {
        let url = self.urls.status_url(endpoint, request_id);
        tracing::trace!(
            endpoint,
            request_id,
            route = ?StatusRoute::for_endpoint(endpoint),
            "Checking request status",
        );

        let response = self
            .client
            .get(&url)
            .query(&[("logs", "1")])
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        let body = Self::ensure_success(response).await?.text().await?;
        parse_status(&body).map_err(|e| QueueError::Decode(format!("status response: {e}")))
    }

    async fn result(
        &self,
        endpoint: &str,
        request_id: &str,
        response_url: Option<&str>,
    ) -> Result<serde_json::Value, QueueError> {
        let url = response_url
            .map(str::to_string)
            .unwrap_or_else(|| self.urls.result_url(endpoint, request_id));

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
