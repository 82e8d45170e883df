//! Generation history entity models.

use mediaforge_core::normalize::{first_image_url, video_url};
use mediaforge_core::task::{BackgroundTask, TaskStatus};
use mediaforge_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `ai_generations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: i64,
    pub task_id: String,
    pub task_type: String,
    pub endpoint: String,
    pub params: serde_json::Value,
    pub result: serde_json::Value,
    pub media_url: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for recording a finished generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGeneration {
    pub task_id: String,
    pub task_type: String,
    pub endpoint: String,
    pub params: serde_json::Value,
    pub result: serde_json::Value,
    /// Primary output URL: the video for video tools, else the first image.
    pub media_url: Option<String>,
    pub created_at: Timestamp,
}

impl NewGeneration {
    /// Build a history entry from a completed task.
    ///
    /// Returns `None` for tasks that are not completed or carry no result.
    pub fn from_task(task: &BackgroundTask) -> Option<Self> {
        if task.status != TaskStatus::Completed {
            return None;
        }
        let result = task.result.clone()?;
        let media_url = if task.task_type.is_video() {
            video_url(&result)
        } else {
            first_image_url(&result)
        }
        .map(str::to_string);

        Some(Self {
            task_id: task.id.clone(),
            task_type: task.task_type.to_string(),
            endpoint: task.endpoint.clone(),
            params: task.params.clone(),
            result,
            media_url,
            created_at: task.timestamp,
        })
    }
}
