//! The seam between the polling runtime and the queue API.

use async_trait::async_trait;

use crate::error::QueueError;
use crate::status::{QueueStatus, SubmitResponse};

/// Operations the runtime needs from a job queue.
///
/// [`FalApi`](crate::api::FalApi) is the production implementation.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Queue a job on `endpoint`.
    async fn submit(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<SubmitResponse, QueueError>;

    /// Fetch the current state of a queued request.
    async fn status(&self, endpoint: &str, request_id: &str) -> Result<QueueStatus, QueueError>;

    /// Fetch the final payload of a completed request.
    ///
    /// `response_url` comes from the status response when the provider
    /// supplied one.
    async fn result(
        &self,
        endpoint: &str,
        request_id: &str,
        response_url: Option<&str>,
    ) -> Result<serde_json::Value, QueueError>;
}
