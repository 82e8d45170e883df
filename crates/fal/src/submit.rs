//! Submit-and-wait flow for queue jobs.
//!
//! [`submit_to_queue`] posts a job, then polls its status every
//! [`PollConfig::interval`] until it completes, fails, or the attempt
//! budget runs out. The background poller reuses [`poll_step`] and
//! [`absorb_poll_error`] so both paths classify status responses the
//! same way.

use std::time::Duration;

use mediaforge_core::endpoints::validate_endpoint;
use serde_json::Value;

use crate::error::QueueError;
use crate::retry::{retry_transient, RetryConfig};
use crate::status::{QueueStatus, SubmitResponse};
use crate::transport::QueueTransport;

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status checks before giving up (about 10 minutes).
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 120;

/// Status polling cadence and budget.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

/// Outcome of a single status check.
#[derive(Debug)]
pub enum PollStep {
    /// Still queued or running.
    Pending(QueueStatus),
    /// Finished; carries the raw provider payload.
    Completed(Value),
}

/// Submit a job and wait for its raw result.
pub async fn submit_to_queue(
    transport: &dyn QueueTransport,
    endpoint: &str,
    payload: &Value,
    retry: &RetryConfig,
    poll: &PollConfig,
) -> Result<Value, QueueError> {
    let submitted = submit_with_retry(transport, endpoint, payload, retry).await?;
    wait_for_completion(transport, endpoint, &submitted.request_id, poll, |_| {}).await
}

/// Validate the endpoint and post the job, retrying transient failures.
pub async fn submit_with_retry(
    transport: &dyn QueueTransport,
    endpoint: &str,
    payload: &Value,
    retry: &RetryConfig,
) -> Result<SubmitResponse, QueueError> {
    validate_endpoint(endpoint)?;
    let submit = move || transport.submit(endpoint, payload);
    retry_transient(retry, "submit", submit).await
}

/// Poll a request until it reaches a terminal state.
///
/// `on_status` sees every non-terminal status, in order.
pub async fn wait_for_completion<F>(
    transport: &dyn QueueTransport,
    endpoint: &str,
    request_id: &str,
    poll: &PollConfig,
    mut on_status: F,
) -> Result<Value, QueueError>
where
    F: FnMut(&QueueStatus),
{
    for attempt in 1..=poll.max_attempts {
        match poll_step(transport, endpoint, request_id).await {
            Ok(PollStep::Completed(value)) => return Ok(value),
            Ok(PollStep::Pending(status)) => on_status(&status),
            Err(e) => absorb_poll_error(e, request_id, attempt)?,
        }

        if attempt < poll.max_attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }

    tracing::warn!(
        endpoint,
        request_id,
        attempts = poll.max_attempts,
        "Request did not finish within the poll budget",
    );
    Err(QueueError::Timeout {
        attempts: poll.max_attempts,
    })
}

/// Run one status check, fetching the result if the request completed.
pub async fn poll_step(
    transport: &dyn QueueTransport,
    endpoint: &str,
    request_id: &str,
) -> Result<PollStep, QueueError> {
    let status = transport.status(endpoint, request_id).await?;
    tracing::debug!(
        endpoint,
        request_id,
        state = status.state(),
        "Request status"
    );

    match status {
        QueueStatus::Completed {
            error: Some(message),
            ..
        } => Err(QueueError::Failed {
            message,
            details: None,
        }),
        QueueStatus::Completed { response_url, .. } => {
            let value = transport
                .result(endpoint, request_id, response_url.as_deref())
                .await?;
            Ok(PollStep::Completed(value))
        }
        QueueStatus::Failed { error, details } => Err(QueueError::Failed {
            message: error.unwrap_or_else(|| "The provider reported a failure".to_string()),
            details,
        }),
        pending => Ok(PollStep::Pending(pending)),
    }
}

/// Swallow a transient status-check error (it still costs an attempt);
/// return anything else.
pub fn absorb_poll_error(e: QueueError, request_id: &str, attempt: u32) -> Result<(), QueueError> {
    if e.is_transient() {
        tracing::warn!(request_id, attempt, error = %e, "Status check failed, will retry");
        Ok(())
    } else {
        Err(e)
    }
}
