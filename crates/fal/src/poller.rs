//! Background status polling for submitted tasks.
//!
//! [`Poller::start_background_polling`] spawns a detached loop per task.
//! The loop writes progress into the [`TaskRegistry`], normalizes the
//! provider payload on completion and marks the task failed on provider
//! failure, timeout or permanent error. Errors never escape the loop:
//! callers observe outcomes through the registry and its events.

use std::sync::Arc;

use mediaforge_core::normalize::normalize_result;
use mediaforge_core::task::TaskType;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::QueueError;
use crate::registry::TaskRegistry;
use crate::submit::{absorb_poll_error, poll_step, PollConfig, PollStep};
use crate::transport::QueueTransport;

/// How a polling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed(String),
    /// The task was removed, pruned, or finished by someone else.
    Vanished,
    /// Shutdown was requested; the task is left pending.
    Cancelled,
}

/// Everything a polling loop needs, cheap to clone into each task.
#[derive(Clone)]
pub struct Poller {
    transport: Arc<dyn QueueTransport>,
    registry: Arc<TaskRegistry>,
    config: PollConfig,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Poller {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        registry: Arc<TaskRegistry>,
        config: PollConfig,
        cancel: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            transport,
            registry,
            config,
            cancel,
            tracker,
        }
    }

    /// Spawn a fire-and-forget polling loop for a pre-created task.
    ///
    /// The loop stops scheduling status checks as soon as the task
    /// reaches a terminal state.
    pub fn start_background_polling(
        &self,
        task_id: &str,
        request_id: &str,
    ) -> tokio::task::JoinHandle<PollOutcome> {
        let poller = self.clone();
        let task_id = task_id.to_string();
        let request_id = request_id.to_string();

        self.tracker.spawn(async move {
            let outcome = tokio::select! {
                _ = poller.cancel.cancelled() => PollOutcome::Cancelled,
                outcome = poller.run(&task_id, &request_id) => outcome,
            };
            tracing::debug!(
                task_id = %task_id,
                request_id = %request_id,
                ?outcome,
                "Polling loop exited",
            );
            outcome
        })
    }

    /// Poll until terminal and write the outcome into the registry.
    pub async fn run(&self, task_id: &str, request_id: &str) -> PollOutcome {
        let Some(task) = self.registry.get(task_id).await else {
            tracing::warn!(task_id, "Polling requested for unknown task");
            return PollOutcome::Vanished;
        };

        let result = self
            .wait(task_id, task.task_type, &task.endpoint, request_id)
            .await;

        let (stored, outcome) = match result {
            Ok(Some(value)) => (
                self.registry.complete(task_id, value).await,
                PollOutcome::Completed,
            ),
            Ok(None) => return PollOutcome::Vanished,
            Err(e) => {
                let message = e.to_string();
                (
                    self.registry.fail(task_id, &message).await,
                    PollOutcome::Failed(message),
                )
            }
        };

        match stored {
            Ok(_) => outcome,
            Err(e) => {
                tracing::warn!(task_id, error = %e, "Could not record polling outcome");
                PollOutcome::Vanished
            }
        }
    }

    /// The status loop. `Ok(None)` means the task disappeared mid-poll.
    async fn wait(
        &self,
        task_id: &str,
        task_type: TaskType,
        endpoint: &str,
        request_id: &str,
    ) -> Result<Option<serde_json::Value>, QueueError> {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            match poll_step(self.transport.as_ref(), endpoint, request_id).await {
                Ok(PollStep::Completed(raw)) => {
                    let normalized = normalize_result(task_type, endpoint, raw)?;
                    return Ok(Some(normalized));
                }
                Ok(PollStep::Pending(status)) => {
                    match self
                        .registry
                        .update_progress(task_id, &status.progress_label())
                        .await
                    {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::info!(task_id, "Task finished elsewhere, stopping");
                            return Ok(None);
                        }
                        Err(_) => {
                            tracing::info!(task_id, "Task removed while polling, stopping");
                            return Ok(None);
                        }
                    }
                }
                Err(e) => absorb_poll_error(e, request_id, attempt)?,
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.interval).await;
            }
        }

        Err(QueueError::Timeout {
            attempts: max_attempts,
        })
    }
}
