//! Task event bus and generation-history recording.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying typed [`TaskEvent`]s.
//! - [`HistoryRecorder`]: background subscriber that writes every
//!   completed task to a [`GenerationStore`](mediaforge_db::GenerationStore).

pub mod bus;
pub mod recorder;

pub use bus::{EventBus, TaskEvent};
pub use recorder::HistoryRecorder;
