//! Background task model and its lifecycle rules.
//!
//! A [`BackgroundTask`] tracks one asynchronous generation job from the
//! moment it is submitted until the provider reports a terminal state.
//! Status only ever moves forward: `pending -> completed` or
//! `pending -> failed`.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{TaskId, Timestamp};

// ---------------------------------------------------------------------------
// Progress labels
// ---------------------------------------------------------------------------

/// Progress shown while the job payload is being posted.
pub const PROGRESS_SUBMITTING: &str = "Submitting...";
/// Progress shown once the provider has accepted the job.
pub const PROGRESS_SUBMITTED: &str = "Submitted, waiting in queue";
/// Progress shown on a completed task.
pub const PROGRESS_COMPLETED: &str = "Completed";
/// Progress shown on a failed task.
pub const PROGRESS_FAILED: &str = "Failed";

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// The kind of media a tool produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

// ---------------------------------------------------------------------------
// TaskType
// ---------------------------------------------------------------------------

/// Every generation tool that can submit a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    TextToImage,
    ImageToImage,
    ImageEdit,
    BackgroundRemoval,
    ImageUpscale,
    FaceSwap,
    VirtualTryOn,
    ProductShot,
    Relight,
    Inpaint,
    Outpaint,
    StyleTransfer,
    SketchToImage,
    ImageToVideo,
    TextToVideo,
    VideoToVideo,
    LipSync,
    TalkingAvatar,
    VideoUpscale,
    VideoBackgroundRemoval,
}

impl TaskType {
    /// All task types, in declaration order.
    pub const ALL: [TaskType; 20] = [
        TaskType::TextToImage,
        TaskType::ImageToImage,
        TaskType::ImageEdit,
        TaskType::BackgroundRemoval,
        TaskType::ImageUpscale,
        TaskType::FaceSwap,
        TaskType::VirtualTryOn,
        TaskType::ProductShot,
        TaskType::Relight,
        TaskType::Inpaint,
        TaskType::Outpaint,
        TaskType::StyleTransfer,
        TaskType::SketchToImage,
        TaskType::ImageToVideo,
        TaskType::TextToVideo,
        TaskType::VideoToVideo,
        TaskType::LipSync,
        TaskType::TalkingAvatar,
        TaskType::VideoUpscale,
        TaskType::VideoBackgroundRemoval,
    ];

    /// Kebab-case name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::TextToImage => "text-to-image",
            TaskType::ImageToImage => "image-to-image",
            TaskType::ImageEdit => "image-edit",
            TaskType::BackgroundRemoval => "background-removal",
            TaskType::ImageUpscale => "image-upscale",
            TaskType::FaceSwap => "face-swap",
            TaskType::VirtualTryOn => "virtual-try-on",
            TaskType::ProductShot => "product-shot",
            TaskType::Relight => "relight",
            TaskType::Inpaint => "inpaint",
            TaskType::Outpaint => "outpaint",
            TaskType::StyleTransfer => "style-transfer",
            TaskType::SketchToImage => "sketch-to-image",
            TaskType::ImageToVideo => "image-to-video",
            TaskType::TextToVideo => "text-to-video",
            TaskType::VideoToVideo => "video-to-video",
            TaskType::LipSync => "lip-sync",
            TaskType::TalkingAvatar => "talking-avatar",
            TaskType::VideoUpscale => "video-upscale",
            TaskType::VideoBackgroundRemoval => "video-background-removal",
        }
    }

    /// Media produced by this tool.
    pub fn media_kind(self) -> MediaKind {
        match self {
            TaskType::ImageToVideo
            | TaskType::TextToVideo
            | TaskType::VideoToVideo
            | TaskType::LipSync
            | TaskType::TalkingAvatar
            | TaskType::VideoUpscale
            | TaskType::VideoBackgroundRemoval => MediaKind::Video,
            _ => MediaKind::Image,
        }
    }

    pub fn is_video(self) -> bool {
        self.media_kind() == MediaKind::Video
    }

    /// The fal.ai endpoint the tool submits to unless overridden.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            TaskType::TextToImage => "fal-ai/flux/dev",
            TaskType::ImageToImage => "fal-ai/flux/dev/image-to-image",
            TaskType::ImageEdit => "fal-ai/flux-pro/kontext",
            TaskType::BackgroundRemoval => "fal-ai/birefnet/v2",
            TaskType::ImageUpscale => "fal-ai/clarity-upscaler",
            TaskType::FaceSwap => "fal-ai/face-swap",
            TaskType::VirtualTryOn => "fal-ai/kling/v1-5/kolors-virtual-try-on",
            TaskType::ProductShot => "fal-ai/bria/product-shot",
            TaskType::Relight => "fal-ai/iclight-v2",
            TaskType::Inpaint => "fal-ai/flux-lora/inpainting",
            TaskType::Outpaint => "fal-ai/bria/expand",
            TaskType::StyleTransfer => "fal-ai/flux-pro/v1.1/redux",
            TaskType::SketchToImage => "fal-ai/flux-control-lora-canny",
            TaskType::ImageToVideo => "fal-ai/kling-video/v2.1/standard/image-to-video",
            TaskType::TextToVideo => "fal-ai/minimax/video-01",
            TaskType::VideoToVideo => "fal-ai/hunyuan-video/video-to-video",
            TaskType::LipSync => "fal-ai/sync-lipsync",
            TaskType::TalkingAvatar => "fal-ai/bytedance/omnihuman",
            TaskType::VideoUpscale => "fal-ai/topaz/upscale/video",
            TaskType::VideoBackgroundRemoval => "fal-ai/ben/v2/video",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown task type: '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BackgroundTask
// ---------------------------------------------------------------------------

/// A client-side record tracking one asynchronous generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundTask {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    /// Human-readable progress line shown next to the task.
    pub progress: String,
    /// Job-specific payload posted to the provider.
    pub params: serde_json::Value,
    /// Normalized provider response, set on completion.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    /// fal.ai endpoint the job was submitted to.
    pub endpoint: String,
    /// Provider-assigned request id, known once submission succeeds.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Creation time.
    pub timestamp: Timestamp,
    pub updated_at: Timestamp,
}

impl BackgroundTask {
    /// Create a pending task with a fresh id.
    pub fn new(
        task_type: TaskType,
        endpoint: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_type,
            status: TaskStatus::Pending,
            progress: PROGRESS_SUBMITTING.to_string(),
            params,
            result: None,
            error: None,
            endpoint: endpoint.into(),
            request_id: None,
            timestamp: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Replace the progress line. Ignored (returns `false`) once terminal.
    pub fn set_progress(&mut self, progress: impl Into<String>) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.progress = progress.into();
        self.updated_at = Utc::now();
        true
    }

    /// Transition `pending -> completed` with the normalized result.
    pub fn complete(&mut self, result: serde_json::Value) -> Result<(), CoreError> {
        self.ensure_pending("complete")?;
        self.status = TaskStatus::Completed;
        self.progress = PROGRESS_COMPLETED.to_string();
        self.result = Some(result);
        self.error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition `pending -> failed` with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), CoreError> {
        self.ensure_pending("fail")?;
        self.status = TaskStatus::Failed;
        self.progress = PROGRESS_FAILED.to_string();
        self.error = Some(error.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_pending(&self, action: &str) -> Result<(), CoreError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Cannot {action} task {}: already {}",
                self.id, self.status
            )))
        }
    }
}
