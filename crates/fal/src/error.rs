//! Error taxonomy for the fal.ai queue layer.
//!
//! HTTP failures keep their status code and the provider's error body;
//! their display text is the user-facing message produced by
//! [`describe_status`].

use mediaforge_core::error::CoreError;
use mediaforge_core::normalize::NormalizeError;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue API answered with a non-2xx status.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        /// Parsed provider error body, when it was JSON.
        details: Option<Value>,
    },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("Network error: {0}")]
    Network(String),

    /// The provider reported the job as failed.
    #[error("Generation failed: {message}")]
    Failed {
        message: String,
        details: Option<Value>,
    },

    /// The job did not reach a terminal state within the poll budget.
    #[error("Generation timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// A response body could not be decoded.
    #[error("Invalid response from fal.ai: {0}")]
    Decode(String),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl QueueError {
    /// Build an [`QueueError::Http`] from a status code and raw body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let details = serde_json::from_str::<Value>(body).ok();
        let detail = details.as_ref().and_then(extract_detail);
        QueueError::Http {
            status,
            message: describe_status(status, detail.as_deref()),
            details,
        }
    }

    /// HTTP status code, for [`QueueError::Http`] only.
    pub fn status(&self) -> Option<u16> {
        match self {
            QueueError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Provider error body, when one was captured.
    pub fn details(&self) -> Option<&Value> {
        match self {
            QueueError::Http { details, .. } | QueueError::Failed { details, .. } => {
                details.as_ref()
            }
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Network errors, 408, 429 and 5xx responses are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::Network(_) => true,
            QueueError::Http { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for QueueError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            QueueError::Decode(e.to_string())
        } else {
            QueueError::Network(e.to_string())
        }
    }
}

/// Rewrite an HTTP status into a message fit for the end user.
pub fn describe_status(status: u16, detail: Option<&str>) -> String {
    match status {
        400 => with_detail("Invalid request", detail),
        401 => "Invalid API key. Check your fal.ai API key.".to_string(),
        402 | 403 => {
            "Access denied: your fal.ai account may be out of credits or have a billing issue."
                .to_string()
        }
        404 => "Endpoint not found. The model may have been renamed or removed.".to_string(),
        408 => "The request timed out. Please try again.".to_string(),
        413 => "File too large. Please use a smaller image or video.".to_string(),
        422 => format!(
            "Validation error: {}",
            detail.unwrap_or("the provider rejected the input")
        ),
        429 => "Rate limit exceeded. Please wait a moment and try again.".to_string(),
        500 => "fal.ai internal server error. Please try again later.".to_string(),
        502..=504 => {
            "fal.ai service is temporarily unavailable. Please try again later.".to_string()
        }
        _ => with_detail(&format!("Request failed with HTTP {status}"), detail),
    }
}

fn with_detail(prefix: &str, detail: Option<&str>) -> String {
    match detail {
        Some(d) => format!("{prefix}: {d}"),
        None => prefix.to_string(),
    }
}

/// Pull a readable message out of a provider error body.
///
/// Handles `{"detail": "..."}`, FastAPI-style
/// `{"detail": [{"loc": [...], "msg": "..."}]}`, and `message`/`error`
/// string fields.
fn extract_detail(body: &Value) -> Option<String> {
    match body.get("detail") {
        Some(Value::String(s)) => return Some(s.clone()),
        Some(Value::Array(items)) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| {
                    let msg = item.get("msg")?.as_str()?;
                    let field = item
                        .get("loc")
                        .and_then(Value::as_array)
                        .and_then(|loc| loc.last())
                        .and_then(Value::as_str);
                    Some(match field {
                        Some(f) => format!("{f}: {msg}"),
                        None => msg.to_string(),
                    })
                })
                .collect();
            if !parts.is_empty() {
                return Some(parts.join("; "));
            }
        }
        _ => {}
    }
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn known_statuses_get_user_messages() {
        assert!(describe_status(401, None).contains("API key"));
        assert!(describe_status(403, None).contains("billing"));
        assert!(describe_status(413, None).contains("too large"));
        assert!(describe_status(429, None).contains("Rate limit"));
        let unavailable = describe_status(503, None);
        assert!(unavailable.contains("temporarily unavailable"));
    }

    #[test]
    fn validation_detail_is_flattened() {
        let body = json!({
            "detail": [{"loc": ["body", "image_url"], "msg": "field required", "type": "missing"}]
        });
        let err = QueueError::from_status(422, &body.to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: image_url: field required"
        );
        assert_eq!(err.status(), Some(422));
        assert!(err.details().is_some());
    }

    #[test]
    fn string_detail_and_plain_text_bodies() {
        let err = QueueError::from_status(400, r#"{"detail":"prompt is empty"}"#);
        assert_eq!(err.to_string(), "Invalid request: prompt is empty");

        let err = QueueError::from_status(418, "teapot");
        assert_eq!(err.to_string(), "Request failed with HTTP 418");
        assert!(err.details().is_none());
    }

    #[test]
    fn transient_classification() {
        assert!(QueueError::Network("reset".into()).is_transient());
        assert!(QueueError::from_status(502, "").is_transient());
        assert!(QueueError::from_status(429, "").is_transient());
        assert!(!QueueError::from_status(401, "").is_transient());
        assert!(!QueueError::from_status(422, "").is_transient());
        assert!(!QueueError::Timeout { attempts: 3 }.is_transient());
    }
}
