#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mediaforge_events::EventBus;
use mediaforge_fal::error::QueueError;
use mediaforge_fal::registry::TaskRegistry;
use mediaforge_fal::retry::RetryConfig;
use mediaforge_fal::status::{QueueStatus, SubmitResponse};
use mediaforge_fal::submit::PollConfig;
use mediaforge_fal::transport::QueueTransport;
use serde_json::Value;

/// One scripted reply from the fake queue.
pub enum Reply<T> {
    Ok(T),
    /// HTTP error with this status code.
    Http(u16),
    /// Connection-level failure.
    Network,
}

impl<T> Reply<T> {
    fn into_result(self) -> Result<T, QueueError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Http(status) => Err(QueueError::from_status(status, "")),
            Reply::Network => Err(QueueError::Network("connection reset".to_string())),
        }
    }
}

/// In-memory [`QueueTransport`] replaying a script of responses.
///
/// Once the status script runs dry every further check reports
/// `IN_QUEUE`, so tests can assert that polling stopped.
#[derive(Default)]
pub struct ScriptedTransport {
    submits: Mutex<VecDeque<Reply<SubmitResponse>>>,
    statuses: Mutex<VecDeque<Reply<QueueStatus>>>,
    result: Mutex<Option<Value>>,
    pub submit_calls: AtomicU32,
    pub status_calls: AtomicU32,
    pub result_calls: AtomicU32,
    pub last_response_url: Mutex<Option<String>>,
    /// Registry emptied while a submission is in flight.
    evict_on_submit: Mutex<Option<Arc<TaskRegistry>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit_reply(self, reply: Reply<SubmitResponse>) -> Self {
        self.submits.lock().unwrap().push_back(reply);
        self
    }

    pub fn status_reply(self, reply: Reply<QueueStatus>) -> Self {
        self.statuses.lock().unwrap().push_back(reply);
        self
    }

    pub fn statuses(self, statuses: impl IntoIterator<Item = QueueStatus>) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .extend(statuses.into_iter().map(Reply::Ok));
        self
    }

    pub fn result(self, value: Value) -> Self {
        *self.result.lock().unwrap() = Some(value);
        self
    }

    pub fn evict_on_submit(&self, registry: Arc<TaskRegistry>) {
        *self.evict_on_submit.lock().unwrap() = Some(registry);
    }

    pub fn status_count(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn result_count(&self) -> u32 {
        self.result_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueTransport for ScriptedTransport {
    async fn submit(
        &self,
        _endpoint: &str,
        _payload: &Value,
    ) -> Result<SubmitResponse, QueueError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let evict = self.evict_on_submit.lock().unwrap().clone();
        if let Some(registry) = evict {
            for task in registry.list().await {
                registry.remove(&task.id).await;
            }
        }
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Ok(submitted("req-1")))
            .into_result()
    }

    async fn status(&self, _endpoint: &str, _request_id: &str) -> Result<QueueStatus, QueueError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Ok(in_queue(None)))
            .into_result()
    }

    async fn result(
        &self,
        _endpoint: &str,
        _request_id: &str,
        response_url: Option<&str>,
    ) -> Result<Value, QueueError> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_response_url.lock().unwrap() = response_url.map(str::to_string);
        self.result
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| QueueError::from_status(404, ""))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn submitted(request_id: &str) -> SubmitResponse {
    SubmitResponse {
        request_id: request_id.to_string(),
        status_url: None,
        response_url: None,
        cancel_url: None,
        queue_position: None,
    }
}

pub fn in_queue(position: Option<u32>) -> QueueStatus {
    QueueStatus::InQueue {
        queue_position: position,
        response_url: None,
    }
}

pub fn in_progress() -> QueueStatus {
    QueueStatus::InProgress {
        logs: None,
        response_url: None,
    }
}

pub fn completed() -> QueueStatus {
    QueueStatus::Completed {
        logs: None,
        response_url: Some("https://queue.fal.run/fal-ai/x/requests/req-1".to_string()),
        error: None,
    }
}

pub fn failed(message: &str) -> QueueStatus {
    QueueStatus::Failed {
        error: Some(message.to_string()),
        details: None,
    }
}

/// Millisecond polling so tests finish quickly.
pub fn fast_poll(max_attempts: u32) -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(2),
        max_attempts,
    }
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        ..Default::default()
    }
}

pub fn as_transport(transport: &Arc<ScriptedTransport>) -> Arc<dyn QueueTransport> {
    transport.clone()
}

pub fn registry() -> Arc<TaskRegistry> {
    Arc::new(TaskRegistry::new(Arc::new(EventBus::default())))
}
