//! fal.ai queue client and background task runtime.
//!
//! Provides the REST client for the fal.ai job queue, the
//! [`QueueTransport`](transport::QueueTransport) seam, retry/backoff,
//! the blocking [`submit_to_queue`](submit::submit_to_queue) flow, the
//! [`TaskRegistry`](registry::TaskRegistry), the background poller and
//! the [`TaskManager`](manager::TaskManager) tying them together.

pub mod api;
pub mod config;
pub mod error;
pub mod manager;
pub mod poller;
pub mod registry;
pub mod retry;
pub mod status;
pub mod submit;
pub mod transport;

pub use error::QueueError;
pub use manager::TaskManager;
pub use registry::TaskRegistry;
