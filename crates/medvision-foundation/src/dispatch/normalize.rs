//! Result Normalizer — Raw Payload to Normalized Reply
//!
//! Upstream endpoints answer in heterogeneous shapes: plain string content,
//! mixed arrays of typed parts (image mode), explicit `error` payloads on an
//! otherwise successful HTTP exchange. This module maps all of them onto the
//! single output contract per mode:
//!
//! ```text
//! {"choices":[{"message":{"content":"..."}}]}          ──▶ Text { text }
//! {"choices":[{"message":{"content":[                  ──▶ Image { image_url, description }
//!     {"type":"image_url","image_url":{"url":"..."}},
//!     {"type":"text","text":"..."}]}}]}
//! {"error":{"message":"..."}}                          ──▶ UpstreamRejected
//! anything else                                        ──▶ MalformedResponse
//! ```
//!
//! Every function here is pure: no I/O, no hidden state, and normalizing the
//! same payload twice yields identical replies.

use serde_json::Value;

use super::types::{AttemptError, GenerationMode, NormalizedReply};

/// Fallback description when an image payload carries no text part.
pub const DEFAULT_IMAGE_DESCRIPTION: &str = "Medical diagram generated";

/// Map a raw upstream payload to the normalized reply for `mode`.
///
/// A payload carrying a top-level `error` field is classified
/// [`AttemptError::UpstreamRejected`] regardless of mode; otherwise the
/// payload must carry `choices[0].message.content` or it is
/// [`AttemptError::MalformedResponse`].
pub fn normalize_reply(mode: GenerationMode, payload: &Value) -> Result<NormalizedReply, AttemptError> {
    if let Some(message) = upstream_error_message(payload) {
        return Err(AttemptError::UpstreamRejected(message));
    }

    match mode {
        GenerationMode::Text => normalize_text(payload),
        GenerationMode::Image => normalize_image(payload),
    }
}

/// Extract the `error` message from a payload, if present.
///
/// OpenRouter reports some failures as `{"error": {"message": ...}}` inside
/// an HTTP 200 response; a bare string `error` is also accepted.
fn upstream_error_message(payload: &Value) -> Option<String> {
    let error = payload.get("error")?;
    match error {
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => Some(
            fields
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

/// The first choice of the payload.
///
/// A payload without a `choices` array is unrecognized entirely
/// (`MalformedResponse`); a recognizable payload whose choice list is
/// empty is an upstream that answered without answering (`EmptyResponse`).
fn first_choice(payload: &Value) -> Result<&Value, AttemptError> {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AttemptError::MalformedResponse(format!("no choices array: {}", summarize(payload)))
        })?
        .first()
        .ok_or(AttemptError::EmptyResponse)
}

/// `message.content` of one choice, if present.
fn message_content(choice: &Value) -> Option<&Value> {
    choice.get("message").and_then(|message| message.get("content"))
}

fn normalize_text(payload: &Value) -> Result<NormalizedReply, AttemptError> {
    match message_content(first_choice(payload)?) {
        Some(Value::String(text)) if !text.is_empty() => Ok(NormalizedReply::Text {
            text: text.clone(),
        }),
        // Null content or an empty string: the upstream answered without
        // answering.
        None | Some(Value::Null) | Some(Value::String(_)) => Err(AttemptError::EmptyResponse),
        Some(other) => Err(AttemptError::MalformedResponse(format!(
            "text completion content has unexpected type: {}",
            summarize(other)
        ))),
    }
}

fn normalize_image(payload: &Value) -> Result<NormalizedReply, AttemptError> {
    match message_content(first_choice(payload)?) {
        Some(Value::Array(parts)) => {
            // Scan for an image part and a text part independently; either
            // may be absent without failing the attempt.
            let image_url = parts
                .iter()
                .find(|part| part.get("type").and_then(Value::as_str) == Some("image_url"))
                .and_then(|part| part.get("image_url"))
                .and_then(|link| link.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let description = parts
                .iter()
                .find(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .and_then(|part| part.get("text"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_IMAGE_DESCRIPTION.to_string());

            Ok(NormalizedReply::Image {
                image_url,
                description,
            })
        }
        Some(Value::String(text)) => Ok(NormalizedReply::Image {
            image_url: None,
            description: text.clone(),
        }),
        None | Some(Value::Null) => Ok(NormalizedReply::Image {
            image_url: None,
            description: String::new(),
        }),
        Some(other) => Err(AttemptError::MalformedResponse(format!(
            "image completion content has unexpected type: {}",
            summarize(other)
        ))),
    }
}

/// Short, single-line rendering of a payload fragment for error messages.
fn summarize(value: &Value) -> String {
    const MAX_CHARS: usize = 120;
    let rendered = value.to_string();
    if rendered.chars().count() <= MAX_CHARS {
        return rendered;
    }
    let mut truncated: String = rendered.chars().take(MAX_CHARS).collect();
    truncated.push('…');
    truncated
}

// ============================================================================
// Tests
// ============================================================================
