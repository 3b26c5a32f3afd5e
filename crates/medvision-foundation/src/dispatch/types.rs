//! Core Dispatch Types — Requests, Replies, Outcomes, Errors
//!
//! This module defines the provider-agnostic data model shared by every part
//! of the dispatch layer:
//!
//! - **[`DispatchRequest`]** — what the caller hands in (ordered chat
//!   messages plus a generation mode)
//! - **[`NormalizedReply`]** — the single value that escapes the dispatcher,
//!   one shape per mode
//! - **[`AttemptOutcome`]** / **[`AttemptError`]** — the per-attempt record
//!   and its failure taxonomy
//! - **[`DispatchError`]** — the only error that crosses the component
//!   boundary
//!
//! ## Error Propagation Model
//!
//! Individual attempt failures never reach the caller as standalone errors.
//! They are recovered locally, logged, and folded into the terminal
//! aggregate:
//!
//! ```text
//! attempt 1 ──▶ AttemptError::Http { 429 }     ─┐
//! attempt 2 ──▶ AttemptError::Timeout          ─┼──▶ DispatchError::AllEndpointsFailed
//! attempt 3 ──▶ AttemptError::EmptyResponse    ─┘       (one AttemptFailure per attempt,
//!                                                         in completion order)
//! ```
//!
//! The two precondition errors — [`DispatchError::MissingCredential`] and
//! [`DispatchError::InvalidRequest`] — are raised *before* any attempt is
//! made and are distinct from per-attempt failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for the dispatch layer.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

// ============================================================================
// Chat Messages
// ============================================================================

/// The role of a chat message, serialized lowercase on the wire
/// (`"system"`, `"user"`, `"assistant"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message: a role plus its text content.
///
/// # Example
///
/// ```rust
/// use medvision_foundation::dispatch::types::ChatMessage;
///
/// let messages = vec![
///     ChatMessage::system("You are a helpful assistant."),
///     ChatMessage::user("What is hypertension?"),
/// ];
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// What kind of completion the caller wants.
///
/// The mode selects both the candidate endpoint list (free-tier text models
/// fan out; image generation has a single premium endpoint) and the shape of
/// the normalized reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Plain chat completion; normalizes to [`NormalizedReply::Text`].
    Text,
    /// Text+media completion; normalizes to [`NormalizedReply::Image`].
    Image,
}

impl GenerationMode {
    /// Lowercase label for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

/// One dispatch request: an ordered message sequence plus a generation mode.
///
/// The dispatcher borrows the request for the duration of a single dispatch
/// call and never retains it afterwards.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Ordered conversation history, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Generation mode; selects candidates and reply shape.
    pub mode: GenerationMode,
}

impl DispatchRequest {
    /// Create a text-mode request from an ordered message sequence.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            mode: GenerationMode::Text,
        }
    }

    /// Set the generation mode.
    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }
}

// ============================================================================
// Normalized Replies
// ============================================================================

/// The normalized completion value — the only value that escapes the
/// dispatcher. One variant per [`GenerationMode`].
///
/// Serializes untagged so the HTTP caller layer can return it verbatim:
/// text replies as `{"text": ...}`, image replies as
/// `{"imageUrl": ..., "description": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NormalizedReply {
    /// A plain text completion.
    Text { text: String },
    /// A text+media completion. Either part may be absent upstream;
    /// `image_url` defaults to `None` and `description` to a fixed
    /// placeholder.
    #[serde(rename_all = "camelCase")]
    Image {
        image_url: Option<String>,
        description: String,
    },
}

// ============================================================================
// Attempt Outcomes
// ============================================================================

/// The failure taxonomy for a single attempt.
///
/// Callers log and aggregate by kind, so classification is load-bearing:
/// a deadline expiry must surface as `Timeout`, never as `Http`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The attempt did not settle within the per-attempt deadline.
    #[error("no response within {after:?}")]
    Timeout { after: Duration },

    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    /// The endpoint answered 200 but carried an `error` payload instead of
    /// a completion.
    #[error("upstream rejected the request: {0}")]
    UpstreamRejected(String),

    /// The payload was well-formed but carried no completion content.
    #[error("upstream returned no completion content")]
    EmptyResponse,

    /// The payload shape was unrecognized entirely.
    #[error("unrecognized upstream payload: {0}")]
    MalformedResponse(String),

    /// The request never reached the endpoint (connect failure, DNS, TLS).
    #[error("network error: {0}")]
    Network(String),
}

/// The record of one attempt against one endpoint.
///
/// Created per attempt and discarded once folded into the final reply or
/// the terminal error aggregate. The `result` field encodes the
/// success/value/error exclusivity directly: an outcome is either a
/// normalized reply or a classified failure, never both.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// Identifier of the endpoint that was tried.
    pub endpoint: String,
    /// Wall-clock time the attempt took to settle.
    pub elapsed: Duration,
    /// The normalized reply, or the classified failure.
    pub result: Result<NormalizedReply, AttemptError>,
}

impl AttemptOutcome {
    /// Record a successful attempt.
    pub fn success(endpoint: impl Into<String>, elapsed: Duration, reply: NormalizedReply) -> Self {
        Self {
            endpoint: endpoint.into(),
            elapsed,
            result: Ok(reply),
        }
    }

    /// Record a failed attempt.
    pub fn failure(endpoint: impl Into<String>, elapsed: Duration, error: AttemptError) -> Self {
        Self {
            endpoint: endpoint.into(),
            elapsed,
            result: Err(error),
        }
    }
}

/// One entry in the terminal failure aggregate: which endpoint failed,
/// how, and after how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub endpoint: String,
    pub error: AttemptError,
    pub elapsed: Duration,
}

// ============================================================================
// Dispatch Errors
// ============================================================================

/// The only error type that crosses the dispatch boundary.
///
/// `MissingCredential` and `InvalidRequest` are fatal preconditions raised
/// before any attempt is made. `AllEndpointsFailed` is synthesized only
/// once every attempt has failed, wrapping every individual cause in
/// attempt-completion order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No API credential is configured. Raised before any attempt.
    #[error("OPENROUTER_API_KEY is not configured")]
    MissingCredential,

    /// The request failed an input constraint (e.g. zero messages).
    /// Raised before any attempt.
    #[error("invalid dispatch request: {0}")]
    InvalidRequest(String),

    /// Every candidate endpoint failed; one [`AttemptFailure`] per attempt,
    /// in completion order.
    #[error("all {} candidate endpoints failed", .0.len())]
    AllEndpointsFailed(Vec<AttemptFailure>),
}

impl DispatchError {
    /// The aggregated per-attempt failures, if this is the terminal
    /// all-failed error.
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            Self::AllEndpointsFailed(failures) => failures,
            _ => &[],
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::system("rules");
        assert_eq!(msg.role, ChatRole::System);
        assert_eq!(msg.content, "rules");

        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, ChatRole::User);

        let msg = ChatMessage::assistant("hi");
        assert_eq!(msg.role, ChatRole::Assistant);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn test_request_defaults_to_text_mode() {
        let request = DispatchRequest::new(vec![ChatMessage::user("hi")]);
        assert_eq!(request.mode, GenerationMode::Text);

        let request = request.with_mode(GenerationMode::Image);
        assert_eq!(request.mode, GenerationMode::Image);
    }

    #[test]
    fn test_text_reply_serialization() {
        let reply = NormalizedReply::Text {
            text: "answer".to_string(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "answer" }));
    }

    #[test]
    fn test_image_reply_serialization_uses_camel_case() {
        let reply = NormalizedReply::Image {
            image_url: None,
            description: "a diagram".to_string(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "imageUrl": null, "description": "a diagram" })
        );
    }

    #[test]
    fn test_outcome_constructors() {
        let outcome = AttemptOutcome::failure(
            "model-a",
            Duration::from_millis(12),
            AttemptError::EmptyResponse,
        );
        assert_eq!(outcome.endpoint, "model-a");
        assert_eq!(outcome.result, Err(AttemptError::EmptyResponse));

        let outcome = AttemptOutcome::success(
            "model-a",
            Duration::from_millis(5),
            NormalizedReply::Text {
                text: "ok".to_string(),
            },
        );
        assert!(outcome.result.is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = AttemptError::Http {
            status: 429,
            detail: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 429: rate limited");

        let err = DispatchError::AllEndpointsFailed(vec![]);
        assert_eq!(err.to_string(), "all 0 candidate endpoints failed");

        let err = DispatchError::MissingCredential;
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_failures_accessor() {
        let failures = vec![AttemptFailure {
            endpoint: "model-a".to_string(),
            error: AttemptError::Timeout {
                after: Duration::from_secs(25),
            },
            elapsed: Duration::from_secs(25),
        }];
        let err = DispatchError::AllEndpointsFailed(failures.clone());
        assert_eq!(err.failures(), failures.as_slice());

        assert!(DispatchError::MissingCredential.failures().is_empty());
    }
}
