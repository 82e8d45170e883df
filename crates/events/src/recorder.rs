//! Generation history recording service.
//!
//! [`HistoryRecorder`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every completed task to a [`GenerationStore`]. Writes are
//! fire-and-forget from the poller's point of view: a failed write is
//! logged and never affects the task record.

use std::sync::Arc;

use mediaforge_db::models::generation::NewGeneration;
use mediaforge_db::GenerationStore;
use tokio::sync::broadcast;

use crate::bus::TaskEvent;

/// Background service that persists completed generations.
pub struct HistoryRecorder;

impl HistoryRecorder {
    /// Run the recording loop.
    ///
    /// Exits when the channel is closed (i.e. the
    /// [`EventBus`](crate::bus::EventBus) is dropped).
    pub async fn run(
        store: Arc<dyn GenerationStore>,
        mut receiver: broadcast::Receiver<TaskEvent>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::handle(store.as_ref(), &event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "History recorder lagged, some generations were not recorded"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, history recorder shutting down");
                    break;
                }
            }
        }
    }

    /// Record a single event if it marks a completed task.
    pub async fn handle(store: &dyn GenerationStore, event: &TaskEvent) {
        let task = match event {
            TaskEvent::ResponseUpdate { task } | TaskEvent::VideoUpdate { task } => task,
            _ => return,
        };

        let Some(entry) = NewGeneration::from_task(task) else {
            tracing::warn!(task_id = %task.id, "Completed event without a result, not recorded");
            return;
        };

        match store.record(&entry).await {
            Ok(row) => {
                tracing::debug!(
                    task_id = %row.task_id,
                    generation_id = row.id,
                    "Generation recorded"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    task_id = %task.id,
                    task_type = %task.task_type,
                    "Failed to record generation"
                );
            }
        }
    }
}
