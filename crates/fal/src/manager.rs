//! Task lifecycle manager.
//!
//! [`TaskManager`] is the entry point callers use: it creates tasks in the
//! [`TaskRegistry`], submits them to the queue, hands them to the
//! background [`Poller`] and lets callers await their outcome. Shutdown
//! cancels every polling loop through a shared [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use mediaforge_core::error::CoreError;
use mediaforge_core::task::{BackgroundTask, TaskType, PROGRESS_SUBMITTED};
use mediaforge_core::types::TaskId;
use mediaforge_events::{EventBus, TaskEvent};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::FalApi;
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::poller::{PollOutcome, Poller};
use crate::registry::TaskRegistry;
use crate::retry::RetryConfig;
use crate::status::{QueueStatus, SubmitResponse};
use crate::submit::{self, PollConfig};
use crate::transport::QueueTransport;

/// How long [`TaskManager::shutdown`] waits for polling loops to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Progress line given to pending tasks that never reached the queue.
pub const SUBMISSION_INTERRUPTED: &str = "Submission interrupted before the queue accepted the job";

/// Submits tasks and tracks them until they finish.
pub struct TaskManager {
    transport: Arc<dyn QueueTransport>,
    registry: Arc<TaskRegistry>,
    retry: RetryConfig,
    poll: PollConfig,
    cancel: CancellationToken,
    tracker: TaskTracker,
    poller: Poller,
}

impl TaskManager {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        registry: Arc<TaskRegistry>,
        retry: RetryConfig,
        poll: PollConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let poller = Poller::new(
            Arc::clone(&transport),
            Arc::clone(&registry),
            poll.clone(),
            cancel.clone(),
            tracker.clone(),
        );

        Self {
            transport,
            registry,
            retry,
            poll,
            cancel,
            tracker,
            poller,
        }
    }

    /// Build a manager talking to fal.ai over HTTP.
    ///
    /// Loads the task snapshot when `snapshot_path` is configured.
    pub async fn from_config(
        config: &QueueConfig,
        bus: Arc<EventBus>,
    ) -> Result<Self, QueueError> {
        let api = FalApi::new(
            config.api_key.clone(),
            &config.queue_url,
            config.request_timeout,
        )?;

        let registry = match &config.snapshot_path {
            Some(path) => TaskRegistry::load(bus, path)
                .await
                .map_err(|e| QueueError::Config(format!("Cannot load task snapshot: {e}")))?,
            None => TaskRegistry::new(bus),
        };

        let poll = PollConfig {
            interval: config.poll_interval,
            max_attempts: config.max_poll_attempts,
        };

        tracing::info!(
            queue_url = %config.queue_url,
            poll_interval_secs = poll.interval.as_secs(),
            max_poll_attempts = poll.max_attempts,
            "Task manager configured",
        );

        Ok(Self::new(
            Arc::new(api),
            Arc::new(registry),
            RetryConfig::default(),
            poll,
        ))
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.registry.subscribe()
    }

    /// Create a task, submit it, and start polling in the background.
    ///
    /// `endpoint` overrides the task type's default model endpoint. On a
    /// submission error the task is marked failed and the error returned.
    /// Once the job is queued the id is returned even if the task was
    /// evicted from the registry in the meantime.
    pub async fn submit_task(
        &self,
        task_type: TaskType,
        params: Value,
        endpoint: Option<&str>,
    ) -> Result<TaskId, QueueError> {
        let endpoint = endpoint.unwrap_or_else(|| task_type.default_endpoint());
        let task = self.registry.create(task_type, endpoint, params).await;

        let submitted = match submit::submit_with_retry(
            self.transport.as_ref(),
            endpoint,
            &task.params,
            &self.retry,
        )
        .await
        {
            Ok(submitted) => submitted,
            Err(e) => {
                if let Err(mark) = self.registry.fail(&task.id, &e.to_string()).await {
                    tracing::warn!(task_id = %task.id, error = %mark, "Could not mark task failed");
                }
                return Err(e);
            }
        };

        tracing::info!(
            task_id = %task.id,
            task_type = %task_type,
            endpoint,
            request_id = %submitted.request_id,
            "Task submitted",
        );

        // Already queued: a task evicted meanwhile only loses its progress line.
        if let Err(e) = self.record_submission(&task.id, &submitted).await {
            tracing::warn!(
                task_id = %task.id,
                request_id = %submitted.request_id,
                error = %e,
                "Task left the registry during submission",
            );
        }

        self.start_background_polling(&task.id, &submitted.request_id);
        Ok(task.id)
    }

    async fn record_submission(
        &self,
        task_id: &str,
        submitted: &SubmitResponse,
    ) -> Result<(), CoreError> {
        self.registry
            .set_request_id(task_id, &submitted.request_id)
            .await?;
        let progress = match submitted.queue_position {
            Some(position) => QueueStatus::InQueue {
                queue_position: Some(position),
                response_url: None,
            }
            .progress_label(),
            None => PROGRESS_SUBMITTED.to_string(),
        };
        self.registry.update_progress(task_id, &progress).await?;
        Ok(())
    }

    /// Spawn a polling loop for a task that is already in the queue.
    pub fn start_background_polling(
        &self,
        task_id: &str,
        request_id: &str,
    ) -> tokio::task::JoinHandle<PollOutcome> {
        self.poller.start_background_polling(task_id, request_id)
    }

    /// Submit a job and wait for its raw result without creating a task.
    pub async fn submit_to_queue(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> Result<Value, QueueError> {
        submit::submit_to_queue(
            self.transport.as_ref(),
            endpoint,
            payload,
            &self.retry,
            &self.poll,
        )
        .await
    }

    /// Restart polling for pending tasks restored from a snapshot.
    ///
    /// Pending tasks that never received a request id cannot be resumed
    /// and are marked failed. Returns how many loops were started.
    pub async fn resume_pending(&self) -> usize {
        let mut resumed = 0;
        for task in self.registry.pending().await {
            match &task.request_id {
                Some(request_id) => {
                    self.start_background_polling(&task.id, request_id);
                    resumed += 1;
                }
                None => {
                    let failed = self.registry.fail(&task.id, SUBMISSION_INTERRUPTED).await;
                    if let Err(e) = failed {
                        tracing::warn!(
                            task_id = %task.id,
                            error = %e,
                            "Could not fail interrupted task",
                        );
                    }
                }
            }
        }

        if resumed > 0 {
            tracing::info!(resumed, "Resumed polling for pending tasks");
        }
        resumed
    }

    /// Wait until a task completes or fails and return its final record.
    pub async fn wait_for(&self, task_id: &str) -> Result<BackgroundTask, QueueError> {
        // Subscribe before reading so a transition in between is not lost.
        let mut rx = self.subscribe();

        let task = self
            .registry
            .get(task_id)
            .await
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))?;
        if !task.is_pending() {
            return Ok(task);
        }

        loop {
            match rx.recv().await {
                Ok(event) if event.task_id() == task_id => {
                    if event.is_terminal() || matches!(event, TaskEvent::Removed { .. }) {
                        return self
                            .registry
                            .get(task_id)
                            .await
                            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()).into());
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(task_id, skipped = n, "wait_for lagged, rechecking");
                    match self.registry.get(task_id).await {
                        Some(task) if !task.is_pending() => return Ok(task),
                        Some(_) => {}
                        None => return Err(CoreError::TaskNotFound(task_id.to_string()).into()),
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(QueueError::Core(CoreError::Internal(
                        "Event bus closed while waiting for task".to_string(),
                    )));
                }
            }
        }
    }

    /// Stop all polling loops. Tasks still pending stay pending so a
    /// later run can resume them.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!("Timed out waiting for polling loops to stop");
        } else {
            tracing::info!("Task manager stopped");
        }
    }
}
