//! Provider response normalization.
//!
//! fal.ai providers disagree on response shapes. Every stored result
//! follows one contract per media kind:
//!
//! - video tasks: `result.video.url` is a valid `http(s)` URL;
//! - image tasks: images live in a `result.images` array of objects.
//!
//! A [`Normalizer`] is chosen per endpoint first, then the media-kind
//! contract is enforced on whatever the provider returned.

use serde_json::{Map, Value};

use crate::endpoints::endpoint_matches;
use crate::task::{MediaKind, TaskType};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("Provider response is not a JSON object")]
    NotAnObject,

    #[error("Provider response has no video URL")]
    MissingVideoUrl,

    #[error("Invalid video URL: '{0}'")]
    InvalidVideoUrl(String),
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Provider-specific reshaping applied before the media-kind contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Response already follows the contract.
    Passthrough,
    /// `{"video_url": "..."}` becomes `{"video": {"url": "..."}}`.
    VideoUrlField,
    /// `{"video": "..."}` becomes `{"video": {"url": "..."}}`.
    VideoString,
    /// `{"image": {...}}` becomes `{"images": [{...}]}`.
    WrapSingleImage,
}

/// Endpoint prefix to normalizer. First match wins.
const NORMALIZERS: &[(&str, Normalizer)] = &[
    ("fal-ai/bytedance/omnihuman", Normalizer::VideoUrlField),
    ("fal-ai/sync-lipsync", Normalizer::VideoString),
    ("fal-ai/birefnet", Normalizer::WrapSingleImage),
    ("fal-ai/clarity-upscaler", Normalizer::WrapSingleImage),
    ("fal-ai/face-swap", Normalizer::WrapSingleImage),
    ("fal-ai/bria/expand", Normalizer::WrapSingleImage),
    (
        "fal-ai/kling/v1-5/kolors-virtual-try-on",
        Normalizer::WrapSingleImage,
    ),
];

impl Normalizer {
    pub fn for_endpoint(endpoint: &str) -> Self {
        NORMALIZERS
            .iter()
            .find(|(prefix, _)| endpoint_matches(endpoint, prefix))
            .map(|(_, n)| *n)
            .unwrap_or(Normalizer::Passthrough)
    }

    fn apply(self, obj: &mut Map<String, Value>) {
        match self {
            Normalizer::Passthrough => {}
            Normalizer::VideoUrlField => {
                if let Some(Value::String(url)) = obj.remove("video_url") {
                    obj.insert("video".into(), video_object(url, None));
                }
            }
            Normalizer::VideoString => {
                if let Some(Value::String(url)) = obj.get("video").cloned() {
                    obj.insert("video".into(), video_object(url, None));
                }
            }
            Normalizer::WrapSingleImage => wrap_single_image(obj),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Reshape a raw provider payload into the stored result shape.
pub fn normalize_result(
    task_type: TaskType,
    endpoint: &str,
    raw: Value,
) -> Result<Value, NormalizeError> {
    let Value::Object(mut obj) = raw else {
        return Err(NormalizeError::NotAnObject);
    };

    Normalizer::for_endpoint(endpoint).apply(&mut obj);

    match task_type.media_kind() {
        MediaKind::Video => ensure_video_url(&mut obj)?,
        MediaKind::Image => ensure_image_list(&mut obj),
    }

    Ok(Value::Object(obj))
}

/// The video URL of a normalized result, if any.
pub fn video_url(result: &Value) -> Option<&str> {
    result.get("video")?.get("url")?.as_str()
}

/// The first image URL of a normalized result, if any.
pub fn first_image_url(result: &Value) -> Option<&str> {
    result.get("images")?.get(0)?.get("url")?.as_str()
}

/// Validate that a video URL is well formed: `http(s)://host[/...]`.
pub fn validate_video_url(url: &str) -> Result<(), NormalizeError> {
    let invalid = || NormalizeError::InvalidVideoUrl(url.to_string());
    let trimmed = url.trim();
    if trimmed.is_empty() || trimmed.len() != url.len() || url.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(invalid)?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return Err(invalid());
    }
    Ok(())
}

// ---- private helpers ----

fn video_object(url: String, extra: Option<&Map<String, Value>>) -> Value {
    let mut video = extra.cloned().unwrap_or_default();
    video.insert("url".into(), Value::String(url));
    Value::Object(video)
}

/// Find the video URL in any of the known locations and store it at `video.url`.
fn ensure_video_url(obj: &mut Map<String, Value>) -> Result<(), NormalizeError> {
    let url = find_video_url(obj).ok_or(NormalizeError::MissingVideoUrl)?;
    validate_video_url(&url)?;

    let existing = obj.get("video").and_then(Value::as_object).cloned();
    let video = video_object(url, existing.as_ref());
    obj.insert("video".into(), video);
    Ok(())
}

fn find_video_url(obj: &Map<String, Value>) -> Option<String> {
    let candidates = [
        obj.get("video").and_then(|v| v.get("url")),
        obj.get("video"),
        obj.get("video_url"),
        obj.get("videos")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("url")),
        obj.get("videos").and_then(|v| v.get(0)),
        obj.get("output").and_then(|v| v.get("video")),
        obj.get("output").and_then(|v| v.get("video_url")),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::to_string))
}

fn wrap_single_image(obj: &mut Map<String, Value>) {
    if obj.get("images").is_some_and(Value::is_array) {
        return;
    }
    if let Some(image) = obj.remove("image") {
        obj.insert("images".into(), Value::Array(vec![image]));
    }
}

/// Ensure images are an array of `{url, ...}` objects.
fn ensure_image_list(obj: &mut Map<String, Value>) {
    wrap_single_image(obj);
    if let Some(Value::Array(images)) = obj.get_mut("images") {
        for image in images.iter_mut() {
            if let Value::String(url) = image {
                *image = serde_json::json!({ "url": url });
            }
        }
    }
}
