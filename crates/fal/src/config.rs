use std::path::PathBuf;
use std::time::Duration;

use mediaforge_core::endpoints::DEFAULT_QUEUE_URL;

use crate::error::QueueError;
use crate::submit::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};

/// Queue client configuration loaded from environment variables.
#[derive(Clone)]
pub struct QueueConfig {
    /// fal.ai API key.
    pub api_key: String,
    /// Queue base URL (default: `https://queue.fal.run`).
    pub queue_url: String,
    /// Delay between status checks (default: 5 s).
    pub poll_interval: Duration,
    /// Status checks before a task times out (default: 120).
    pub max_poll_attempts: u32,
    /// Per-request HTTP timeout (default: 30 s).
    pub request_timeout: Duration,
    /// Where the task list is persisted, if anywhere.
    pub snapshot_path: Option<PathBuf>,
}

impl std::fmt::Debug for QueueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConfig")
            .field("api_key", &"<redacted>")
            .field("queue_url", &self.queue_url)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("request_timeout", &self.request_timeout)
            .field("snapshot_path", &self.snapshot_path)
            .finish()
    }
}

impl QueueConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `FAL_KEY`              | required (`VITE_FAL_KEY` also accepted) |
    /// | `FAL_QUEUE_URL`        | `https://queue.fal.run`  |
    /// | `POLL_INTERVAL_SECS`   | `5`                      |
    /// | `MAX_POLL_ATTEMPTS`    | `120`                    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                     |
    /// | `TASK_SNAPSHOT_PATH`   | unset (no persistence)   |
    pub fn from_env() -> Result<Self, QueueError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, QueueError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("FAL_KEY")
            .or_else(|| get("VITE_FAL_KEY"))
            .ok_or_else(|| QueueError::Config("FAL_KEY must be set".to_string()))?;

        let queue_url = get("FAL_QUEUE_URL")
            .unwrap_or_else(|| DEFAULT_QUEUE_URL.to_string());

        let poll_interval = match get("POLL_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(parse_number(&v, "POLL_INTERVAL_SECS")?),
            None => DEFAULT_POLL_INTERVAL,
        };

        let max_poll_attempts = match get("MAX_POLL_ATTEMPTS") {
            Some(v) => parse_number::<u32>(&v, "MAX_POLL_ATTEMPTS")?,
            None => DEFAULT_MAX_POLL_ATTEMPTS,
        };
        if max_poll_attempts == 0 {
            return Err(QueueError::Config(
                "MAX_POLL_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let request_timeout = Duration::from_secs(match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => parse_number(&v, "REQUEST_TIMEOUT_SECS")?,
            None => 30,
        });

        let snapshot_path = get("TASK_SNAPSHOT_PATH").map(PathBuf::from);

        Ok(Self {
            api_key,
            queue_url,
            poll_interval,
            max_poll_attempts,
            request_timeout,
            snapshot_path,
        })
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, QueueError> {
    let message = || format!("{key} must be a non-negative integer, got '{value}'");
    value
        .trim()
        .parse()
        .map_err(|_| QueueError::Config(message()))
}
