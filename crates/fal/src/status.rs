//! fal.ai queue response types.
//!
//! The status endpoint answers with `{"status": "<STATE>", ...}`; this
//! module deserializes it into [`QueueStatus`].

use serde::Deserialize;

/// Response returned by `POST {queue}/{endpoint}` after the job is queued.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Provider-assigned identifier for the queued request.
    pub request_id: String,
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
}

/// One line of provider-side logs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogEntry {
    pub message: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Request state reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    InQueue {
        #[serde(default)]
        queue_position: Option<u32>,
        #[serde(default)]
        response_url: Option<String>,
    },
    InProgress {
        #[serde(default)]
        logs: Option<Vec<LogEntry>>,
        #[serde(default)]
        response_url: Option<String>,
    },
    Completed {
        #[serde(default)]
        logs: Option<Vec<LogEntry>>,
        #[serde(default)]
        response_url: Option<String>,
        /// Set when the app itself errored after the request was processed.
        #[serde(default)]
        error: Option<String>,
    },
    Failed {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        details: Option<serde_json::Value>,
    },
}

impl QueueStatus {
    /// Human-readable progress line for a non-terminal status.
    pub fn progress_label(&self) -> String {
        match self {
            QueueStatus::InQueue {
                queue_position: Some(pos),
                ..
            } => format!("In queue (position {pos})"),
            QueueStatus::InQueue { .. } => "In queue".to_string(),
            QueueStatus::InProgress { logs, .. } => match last_log(logs) {
                Some(line) => format!("Processing: {line}"),
                None => "Processing...".to_string(),
            },
            QueueStatus::Completed { .. } => "Fetching result...".to_string(),
            QueueStatus::Failed { .. } => "Failed".to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueStatus::Completed { .. } | QueueStatus::Failed { .. }
        )
    }

    /// Short state name, matching the wire value.
    pub fn state(&self) -> &'static str {
        match self {
            QueueStatus::InQueue { .. } => "IN_QUEUE",
            QueueStatus::InProgress { .. } => "IN_PROGRESS",
            QueueStatus::Completed { .. } => "COMPLETED",
            QueueStatus::Failed { .. } => "FAILED",
        }
    }
}

fn last_log(logs: &Option<Vec<LogEntry>>) -> Option<&str> {
    logs.as_ref()?
        .iter()
        .rev()
        .map(|l| l.message.trim())
        .find(|m| !m.is_empty())
}

/// Parse a status response body.
pub fn parse_status(text: &str) -> Result<QueueStatus, serde_json::Error> {
    serde_json::from_str(text)
}
