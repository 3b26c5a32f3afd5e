//! OpenRouter Executor — One Bounded HTTP Attempt Per Invocation
//!
//! This module implements the [`AttemptExecutor`] trait against the
//! OpenRouter chat-completions API. It is the single place where network
//! framing lives; the dispatch strategies above it never see HTTP.
//!
//! ## Key Design Decisions
//!
//! ### Connection Pooling
//!
//! The `reqwest::Client` is created **once** in
//! [`OpenRouterExecutor::new()`] and reused for every attempt. `reqwest`
//! keeps a persistent connection pool, so parallel-race fan-out and
//! sequential fallback both reuse warm connections instead of paying a TLS
//! handshake per attempt.
//!
//! ### Per-Attempt Deadline
//!
//! Every attempt runs under `tokio::time::timeout` with the configured
//! deadline (default 25 s). The deadline is per attempt, independent of any
//! budget on the overall dispatch; expiry drops the in-flight call and is
//! classified [`AttemptError::Timeout`] — never `Http`.
//!
//! ### Raw Wire Format
//!
//! OpenRouter speaks the OpenAI chat-completions shape but extends it with
//! a `modalities` flag and mixed text/image content-part arrays. The
//! executor therefore builds the request body as raw JSON and hands the raw
//! response payload to the normalizer, rather than going through a typed
//! client that cannot represent those shapes.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::timeout;

use super::endpoints::EndpointDescriptor;
use super::executor::AttemptExecutor;
use super::normalize;
use super::types::{
    AttemptError, AttemptOutcome, DispatchError, DispatchRequest, DispatchResult, GenerationMode,
    NormalizedReply,
};

// ============================================================================
// Constants
// ============================================================================

/// Default OpenRouter chat-completions endpoint.
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default `HTTP-Referer` attribution header (the local dev front-end).
const DEFAULT_REFERER: &str = "http://localhost:5173";

/// Default `X-Title` attribution header.
const DEFAULT_APP_TITLE: &str = "MedVision AI";

/// Default per-attempt deadline, in seconds.
const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 25;

/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion token budget.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Upper bound on upstream error text carried inside an `Http` failure.
const MAX_ERROR_DETAIL_CHARS: usize = 600;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the OpenRouter executor.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use medvision_foundation::dispatch::openrouter::OpenRouterConfig;
///
/// let config = OpenRouterConfig::new("sk-or-...")
///     .with_attempt_timeout(Duration::from_secs(10))
///     .with_temperature(0.2);
/// ```
#[derive(Clone)]
pub struct OpenRouterConfig {
    /// OpenRouter API key.
    pub api_key: String,

    /// Chat-completions URL. Override for self-hosted gateways or tests.
    pub url: String,

    /// `HTTP-Referer` attribution header sent with every attempt.
    pub referer: String,

    /// `X-Title` attribution header sent with every attempt.
    pub app_title: String,

    /// Per-attempt deadline. Independent of any overall dispatch budget.
    pub attempt_timeout: std::time::Duration,

    /// Sampling temperature sent upstream.
    pub temperature: f32,

    /// Completion token budget sent upstream.
    pub max_tokens: u32,
}

impl std::fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The API key never appears in logs.
        f.debug_struct("OpenRouterConfig")
            .field("api_key", &"<redacted>")
            .field("url", &self.url)
            .field("referer", &self.referer)
            .field("app_title", &self.app_title)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenRouterConfig {
    /// Create a configuration with the given API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: OPENROUTER_API_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            app_title: DEFAULT_APP_TITLE.to_string(),
            attempt_timeout: std::time::Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Create a configuration from the environment.
    ///
    /// # Panics
    /// Panics if `OPENROUTER_API_KEY` is not set. For fallible creation,
    /// use [`OpenRouterConfig::try_from_env`].
    pub fn from_env() -> Self {
        Self::try_from_env().expect("OPENROUTER_API_KEY environment variable not set")
    }

    /// Try to create a configuration from the environment.
    ///
    /// Recognized variables:
    /// - `OPENROUTER_API_KEY` — required; absence is
    ///   [`DispatchError::MissingCredential`]
    /// - `OPENROUTER_BASE_URL` — chat-completions URL override
    /// - `FRONTEND_URL` — `HTTP-Referer` attribution header
    /// - `OPENROUTER_TIMEOUT_SECS` — per-attempt deadline override
    /// - `OPENROUTER_TEMPERATURE` — sampling temperature
    /// - `OPENROUTER_MAX_TOKENS` — completion token budget
    pub fn try_from_env() -> DispatchResult<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(DispatchError::MissingCredential)?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENROUTER_BASE_URL") {
            config.url = url;
        }
        if let Ok(referer) = std::env::var("FRONTEND_URL") {
            config.referer = referer;
        }
        if let Some(secs) = env_parse::<u64>("OPENROUTER_TIMEOUT_SECS") {
            config.attempt_timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(temperature) = env_parse::<f32>("OPENROUTER_TEMPERATURE") {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = env_parse::<u32>("OPENROUTER_MAX_TOKENS") {
            config.max_tokens = max_tokens;
        }
        Ok(config)
    }

    /// Set the chat-completions URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the `HTTP-Referer` attribution header.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    /// Set the `X-Title` attribution header.
    pub fn with_app_title(mut self, app_title: impl Into<String>) -> Self {
        self.app_title = app_title.into();
        self
    }

    /// Set the per-attempt deadline.
    pub fn with_attempt_timeout(mut self, attempt_timeout: std::time::Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Parse an env var, ignoring it when absent or unparseable.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}

// ============================================================================
// OpenRouterExecutor
// ============================================================================

/// The production [`AttemptExecutor`]: one HTTP POST per invocation, no
/// internal retries, every failure classified into the attempt taxonomy.
pub struct OpenRouterExecutor {
    /// Shared HTTP client; created once so the connection pool is reused
    /// across attempts.
    http: reqwest::Client,

    /// Executor configuration.
    config: OpenRouterConfig,
}

impl std::fmt::Debug for OpenRouterExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterExecutor")
            .field("config", &self.config)
            .finish()
    }
}

impl OpenRouterExecutor {
    /// Create a new executor with the given configuration.
    ///
    /// The HTTP client is built immediately; no network call is made until
    /// the first attempt.
    pub fn new(config: OpenRouterConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Create an executor configured from the environment.
    pub fn try_from_env() -> DispatchResult<Self> {
        Ok(Self::new(OpenRouterConfig::try_from_env()?))
    }

    /// The executor configuration.
    pub fn config(&self) -> &OpenRouterConfig {
        &self.config
    }

    /// Build the upstream request body for one `(endpoint, request)` pair.
    fn request_body(&self, endpoint: &EndpointDescriptor, request: &DispatchRequest) -> Value {
        let mut body = json!({
            "model": endpoint.id,
            "messages": request.messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        if request.mode == GenerationMode::Image {
            body["modalities"] = json!(["text", "image"]);
        }
        body
    }

    /// Perform the HTTP exchange and normalize the payload.
    ///
    /// Runs inside the per-attempt deadline applied by `execute`.
    async fn call(
        &self,
        endpoint: &EndpointDescriptor,
        request: &DispatchRequest,
    ) -> Result<NormalizedReply, AttemptError> {
        let body = self.request_body(endpoint, request);

        let response = self
            .http
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.app_title)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.classify_transport_error(&e))?;

        if !status.is_success() {
            return Err(AttemptError::Http {
                status: status.as_u16(),
                detail: truncate_chars(&text, MAX_ERROR_DETAIL_CHARS),
            });
        }

        let payload: Value = serde_json::from_str(&text)
            .map_err(|e| AttemptError::MalformedResponse(format!("invalid JSON body: {}", e)))?;

        normalize::normalize_reply(request.mode, &payload)
    }

    /// Classify a transport-level `reqwest` error.
    ///
    /// A timeout surfacing from the client itself is still a `Timeout`;
    /// everything else (connect refused, DNS, TLS) never reached the
    /// endpoint and is `Network`.
    fn classify_transport_error(&self, error: &reqwest::Error) -> AttemptError {
        if error.is_timeout() {
            AttemptError::Timeout {
                after: self.config.attempt_timeout,
            }
        } else {
            AttemptError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl AttemptExecutor for OpenRouterExecutor {
    fn name(&self) -> &str {
        "OpenRouter"
    }

    /// The credential precondition: an empty API key fails every attempt
    /// identically, so it is rejected before any attempt is made.
    fn ready(&self) -> DispatchResult<()> {
        if self.config.api_key.is_empty() {
            return Err(DispatchError::MissingCredential);
        }
        Ok(())
    }

    async fn execute(
        &self,
        endpoint: &EndpointDescriptor,
        request: &DispatchRequest,
    ) -> AttemptOutcome {
        tracing::debug!(
            "OpenRouter: attempting '{}' (mode={}, {} messages)",
            endpoint.id,
            request.mode.as_str(),
            request.messages.len(),
        );

        let started = Instant::now();
        let deadline = self.config.attempt_timeout;

        let result = match timeout(deadline, self.call(endpoint, request)).await {
            Ok(result) => result,
            // Deadline expiry drops the in-flight call.
            Err(_) => Err(AttemptError::Timeout { after: deadline }),
        };

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => {
                tracing::debug!("OpenRouter: '{}' succeeded in {:?}", endpoint.id, elapsed);
            }
            Err(error) => {
                tracing::warn!(
                    "OpenRouter: '{}' failed after {:?}: {}",
                    endpoint.id,
                    elapsed,
                    error,
                );
            }
        }

        AttemptOutcome {
            endpoint: endpoint.id.clone(),
            elapsed,
            result,
        }
    }
}

/// Truncate to a character budget, marking the cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

// ============================================================================
// Tests
// ============================================================================
