//! fal.ai queue URL construction and status routing.
//!
//! Most endpoints expose request status under their full path. A small
//! allow-list of endpoints is polled the way the fal client SDK does it:
//! under the `owner/app` root, with any sub-path dropped.

use crate::error::CoreError;

/// Default queue base URL.
pub const DEFAULT_QUEUE_URL: &str = "https://queue.fal.run";

/// Endpoints whose status and result live under the app root.
pub const APP_ROOT_ENDPOINTS: &[&str] = &[
    "fal-ai/kling-video",
    "fal-ai/minimax",
    "fal-ai/bytedance/omnihuman",
    "fal-ai/kling/v1-5/kolors-virtual-try-on",
];

/// How a request's status and result URLs are derived from the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRoute {
    /// `{base}/{endpoint}/requests/{id}`.
    FullPath,
    /// `{base}/{owner}/{app}/requests/{id}`.
    AppRoot,
}

impl StatusRoute {
    /// Pick the route for an endpoint using [`APP_ROOT_ENDPOINTS`].
    pub fn for_endpoint(endpoint: &str) -> Self {
        let special = APP_ROOT_ENDPOINTS
            .iter()
            .any(|prefix| endpoint_matches(endpoint, prefix));
        if special {
            StatusRoute::AppRoot
        } else {
            StatusRoute::FullPath
        }
    }
}

/// `true` when `endpoint` is `prefix` or lies below it on a `/` boundary.
pub fn endpoint_matches(endpoint: &str, prefix: &str) -> bool {
    let endpoint = endpoint.trim_matches('/');
    endpoint == prefix
        || endpoint
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Validate an endpoint id of the form `owner/app[/sub/path]`.
pub fn validate_endpoint(endpoint: &str) -> Result<(), CoreError> {
    let trimmed = endpoint.trim_matches('/');
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Endpoint must not be empty".to_string(),
        ));
    }
    if trimmed.contains("://") || trimmed.contains(char::is_whitespace) {
        return Err(CoreError::Validation(format!(
            "Endpoint must be an 'owner/app' path, got: '{endpoint}'"
        )));
    }
    if trimmed.split('/').count() < 2 || trimmed.split('/').any(str::is_empty) {
        return Err(CoreError::Validation(format!(
            "Endpoint must be an 'owner/app' path, got: '{endpoint}'"
        )));
    }
    Ok(())
}

/// The `owner/app` prefix of an endpoint.
pub fn app_root(endpoint: &str) -> String {
    endpoint
        .trim_matches('/')
        .split('/')
        .take(2)
        .collect::<Vec<_>>()
        .join("/")
}

/// URL builder bound to one queue base URL.
#[derive(Debug, Clone)]
pub struct QueueUrls {
    base_url: String,
}

impl QueueUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST` target for a new job.
    pub fn submit_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_matches('/'))
    }

    /// `GET` target for a request's status.
    pub fn status_url(&self, endpoint: &str, request_id: &str) -> String {
        format!("{}/status", self.request_url(endpoint, request_id))
    }

    /// `GET` target for a request's final payload.
    pub fn result_url(&self, endpoint: &str, request_id: &str) -> String {
        self.request_url(endpoint, request_id)
    }

    fn request_url(&self, endpoint: &str, request_id: &str) -> String {
        let path = match StatusRoute::for_endpoint(endpoint) {
            StatusRoute::FullPath => endpoint.trim_matches('/').to_string(),
            StatusRoute::AppRoot => app_root(endpoint),
        };
        format!("{}/{}/requests/{}", self.base_url, path, request_id)
    }
}

impl Default for QueueUrls {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_URL)
    }
}
