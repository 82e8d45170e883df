//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`TaskEvent`]s. It is
//! shared via `Arc<EventBus>` between the task registry, the history
//! recorder and whatever front end is watching tasks.

use mediaforge_core::task::{BackgroundTask, TaskType};
use mediaforge_core::types::TaskId;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// TaskEvent
// ---------------------------------------------------------------------------

/// A change to a background task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was added to the registry.
    Created { task: BackgroundTask },

    /// The human-readable progress line of a pending task changed.
    Progress { task_id: TaskId, progress: String },

    /// A non-video task completed with its normalized result.
    ResponseUpdate { task: BackgroundTask },

    /// A video task completed; `task.result.video.url` is set.
    VideoUpdate { task: BackgroundTask },

    /// A task failed.
    Failed {
        task_id: TaskId,
        task_type: TaskType,
        error: String,
    },

    /// A task was removed by the user or by retention.
    Removed { task_id: TaskId },
}

impl TaskEvent {
    /// Completion event for a task, routed by media kind.
    pub fn completed(task: BackgroundTask) -> Self {
        if task.task_type.is_video() {
            TaskEvent::VideoUpdate { task }
        } else {
            TaskEvent::ResponseUpdate { task }
        }
    }

    /// Id of the task this event concerns.
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Created { task }
            | TaskEvent::ResponseUpdate { task }
            | TaskEvent::VideoUpdate { task } => &task.id,
            TaskEvent::Progress { task_id, .. }
            | TaskEvent::Failed { task_id, .. }
            | TaskEvent::Removed { task_id } => task_id,
        }
    }

    /// `true` for events marking a task as completed or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::ResponseUpdate { .. }
                | TaskEvent::VideoUpdate { .. }
                | TaskEvent::Failed { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use mediaforge_events::bus::{EventBus, TaskEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(TaskEvent::Removed { task_id: "t-1".into() });
/// ```
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: TaskEvent) {
        // Ignore the SendError: it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
