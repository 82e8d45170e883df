//! In-memory task registry with an optional JSON snapshot.
//!
//! [`TaskRegistry`] owns the list of [`BackgroundTask`]s. Every mutation
//! publishes a [`TaskEvent`] on the shared [`EventBus`] and, when a
//! snapshot path is configured, rewrites the snapshot file so the list
//! survives restarts. Concurrent writers are last-writer-wins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use mediaforge_core::error::CoreError;
use mediaforge_core::retention;
use mediaforge_core::task::{BackgroundTask, TaskType};
use mediaforge_core::types::Timestamp;
use mediaforge_events::{EventBus, TaskEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

/// Errors reading or writing the snapshot file.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk representation of the registry.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: Timestamp,
    tasks: Vec<BackgroundTask>,
}

/// Shared registry of background tasks, newest first.
#[derive(Debug)]
pub struct TaskRegistry {
    tasks: RwLock<Vec<BackgroundTask>>,
    bus: Arc<EventBus>,
    snapshot_path: Option<PathBuf>,
}

impl TaskRegistry {
    /// Registry without persistence.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            bus,
            snapshot_path: None,
        }
    }

    /// Registry backed by a snapshot file.
    ///
    /// Loads the file when it exists, applying retention to what was
    /// read and rewriting the file if anything was pruned. A missing file
    /// starts an empty registry.
    pub async fn load(bus: Arc<EventBus>, path: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let path = path.into();
        let mut tasks = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)?.tasks,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let pruned = retention::prune(&mut tasks, Utc::now());
        if pruned > 0 {
            if let Err(e) = write_snapshot(&path, &tasks).await {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to rewrite pruned task snapshot",
                );
            }
        }

        tracing::info!(
            path = %path.display(),
            loaded = tasks.len(),
            pruned,
            "Task snapshot loaded",
        );

        Ok(Self {
            tasks: RwLock::new(tasks),
            bus,
            snapshot_path: Some(path),
        })
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.bus.subscribe()
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    // ---- queries ----

    pub async fn get(&self, id: &str) -> Option<BackgroundTask> {
        self.tasks
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    /// All tasks, newest first.
    pub async fn list(&self) -> Vec<BackgroundTask> {
        self.tasks.read().await.clone()
    }

    pub async fn list_by_type(&self, task_type: TaskType) -> Vec<BackgroundTask> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|t| t.task_type == task_type)
            .cloned()
            .collect()
    }

    pub async fn pending(&self) -> Vec<BackgroundTask> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|t| t.is_pending())
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    // ---- mutations ----

    /// Create a pending task and add it, applying retention.
    pub async fn create(
        &self,
        task_type: TaskType,
        endpoint: impl Into<String>,
        params: serde_json::Value,
    ) -> BackgroundTask {
        let task = BackgroundTask::new(task_type, endpoint, params);
        self.insert(task).await
    }

    /// Add an existing task record, applying retention.
    pub async fn insert(&self, task: BackgroundTask) -> BackgroundTask {
        let mut tasks = self.tasks.write().await;
        tasks.retain(|t| t.id != task.id);
        tasks.insert(0, task.clone());

        let before: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        retention::prune(&mut tasks, Utc::now());

        tracing::debug!(task_id = %task.id, task_type = %task.task_type, "Task created");
        self.bus.publish(TaskEvent::Created { task: task.clone() });
        self.publish_removed(&before, &tasks);
        self.persist(&tasks).await;
        task
    }

    /// Record the provider request id once submission succeeds.
    pub async fn set_request_id(&self, id: &str, request_id: &str) -> Result<(), CoreError> {
        let mut tasks = self.tasks.write().await;
        let task = find_mut(&mut tasks, id)?;
        task.request_id = Some(request_id.to_string());
        task.updated_at = Utc::now();
        self.persist(&tasks).await;
        Ok(())
    }

    /// Replace a pending task's progress line.
    ///
    /// Returns `Ok(false)` when the task is already terminal.
    pub async fn update_progress(&self, id: &str, progress: &str) -> Result<bool, CoreError> {
        let mut tasks = self.tasks.write().await;
        let task = find_mut(&mut tasks, id)?;
        if task.progress == progress && task.is_pending() {
            return Ok(true);
        }
        if !task.set_progress(progress) {
            return Ok(false);
        }
        self.bus.publish(TaskEvent::Progress {
            task_id: id.to_string(),
            progress: progress.to_string(),
        });
        self.persist(&tasks).await;
        Ok(true)
    }

    /// Mark a task completed with its normalized result.
    ///
    /// Publishes `VideoUpdate` for video tasks and `ResponseUpdate`
    /// otherwise. Fails with [`CoreError::Conflict`] if the task is
    /// already terminal.
    pub async fn complete(
        &self,
        id: &str,
        result: serde_json::Value,
    ) -> Result<BackgroundTask, CoreError> {
        let mut tasks = self.tasks.write().await;
        let task = find_mut(&mut tasks, id)?;
        task.complete(result)?;
        let task = task.clone();

        tracing::info!(task_id = %task.id, task_type = %task.task_type, "Task completed");
        self.bus.publish(TaskEvent::completed(task.clone()));
        self.persist(&tasks).await;
        Ok(task)
    }

    /// Mark a task failed. Fails with [`CoreError::Conflict`] if terminal.
    pub async fn fail(&self, id: &str, error: &str) -> Result<BackgroundTask, CoreError> {
        let mut tasks = self.tasks.write().await;
        let task = find_mut(&mut tasks, id)?;
        task.fail(error)?;
        let task = task.clone();

        tracing::warn!(task_id = %task.id, task_type = %task.task_type, error, "Task failed");
        self.bus.publish(TaskEvent::Failed {
            task_id: task.id.clone(),
            task_type: task.task_type,
            error: error.to_string(),
        });
        self.persist(&tasks).await;
        Ok(task)
    }

    pub async fn remove(&self, id: &str) -> Option<BackgroundTask> {
        let mut tasks = self.tasks.write().await;
        let idx = tasks.iter().position(|t| t.id == id)?;
        let removed = tasks.remove(idx);
        self.bus.publish(TaskEvent::Removed {
            task_id: removed.id.clone(),
        });
        self.persist(&tasks).await;
        Some(removed)
    }

    /// Drop every completed or failed task, returning how many were removed.
    pub async fn clear_finished(&self) -> usize {
        let mut tasks = self.tasks.write().await;
        let before: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        tasks.retain(|t| t.is_pending());
        let removed = before.len() - tasks.len();
        if removed > 0 {
            self.publish_removed(&before, &tasks);
            self.persist(&tasks).await;
        }
        removed
    }

    /// Apply the retention policy now, returning how many were removed.
    pub async fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now()).await
    }

    /// [`cleanup`](Self::cleanup) against an explicit clock.
    pub async fn cleanup_at(&self, now: Timestamp) -> usize {
        let mut tasks = self.tasks.write().await;
        let before: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let removed = retention::prune(&mut tasks, now);
        if removed > 0 {
            tracing::info!(removed, "Task retention pruned tasks");
            self.publish_removed(&before, &tasks);
            self.persist(&tasks).await;
        }
        removed
    }

    // ---- private helpers ----

    fn publish_removed(&self, before: &[String], after: &[BackgroundTask]) {
        for id in before {
            if !after.iter().any(|t| &t.id == id) {
                self.bus.publish(TaskEvent::Removed {
                    task_id: id.clone(),
                });
            }
        }
    }

    /// Rewrite the snapshot file. Failures are logged, never returned.
    async fn persist(&self, tasks: &[BackgroundTask]) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        if let Err(e) = write_snapshot(path, tasks).await {
            tracing::error!(path = %path.display(), error = %e, "Failed to write task snapshot");
        }
    }
}

fn find_mut<'a>(
    tasks: &'a mut [BackgroundTask],
    id: &str,
) -> Result<&'a mut BackgroundTask, CoreError> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))
}

/// Write via a temporary file and rename so readers never see a partial file.
async fn write_snapshot(path: &Path, tasks: &[BackgroundTask]) -> Result<(), SnapshotError> {
    let snapshot = Snapshot {
        saved_at: Utc::now(),
        tasks: tasks.to_vec(),
    };
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
