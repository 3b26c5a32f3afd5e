//! Upstream Model Dispatch Module
//!
//! This module resolves one chat-completion request into one normalized
//! reply across several interchangeable, unreliable, externally-rate-limited
//! model endpoints:
//!
//! - **[`EndpointSet`]** — static ordered candidate catalog, per mode
//! - **[`AttemptExecutor`]** — one bounded-time call to one endpoint
//! - **[`OpenRouterExecutor`]** — the production executor (HTTP + deadline +
//!   failure classification)
//! - **[`normalize`]** — pure mapping of heterogeneous payloads onto one
//!   output contract per mode
//! - **[`Dispatcher`]** — the strategy layer: ordered sequential fallback or
//!   all-at-once parallel race, selected by configuration
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │            Chat / Image request handler (caller)              │
//! └────────────────────────┬──────────────────────────────────────┘
//!                          │ DispatchRequest
//!                          ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                       Dispatcher                              │
//! │   strategy: SequentialFallback | ParallelRace                 │
//! │            │                                                  │
//! │            ▼  per candidate (EndpointSet order)               │
//! │   ┌─────────────────────┐      ┌───────────────────────┐     │
//! │   │   AttemptExecutor   │─────▶│   Result Normalizer   │     │
//! │   │ (deadline, classify)│      │   (pure, per mode)    │     │
//! │   └─────────────────────┘      └───────────────────────┘     │
//! └────────────────────────┬──────────────────────────────────────┘
//!                          │ NormalizedReply | DispatchError
//!                          ▼
//! ```
//!
//! Individual attempt failures never escape: they are logged, classified,
//! and folded into the terminal `AllEndpointsFailed` aggregate. Exactly one
//! normalized reply or one dispatch error is produced per request.

/// Core types: requests, replies, attempt outcomes, error taxonomy.
pub mod types;

/// Static ordered candidate catalog.
pub mod endpoints;

/// The object-safe executor trait shared by both strategies.
pub mod executor;

/// Pure payload-to-reply normalization.
pub mod normalize;

/// The OpenRouter-backed executor: config + bounded HTTP attempts.
pub mod openrouter;

/// The strategy layer: sequential fallback and parallel race.
pub mod dispatcher;

// ── Re-exports ──

pub use types::{
    AttemptError, AttemptFailure, AttemptOutcome, ChatMessage, ChatRole, DispatchError,
    DispatchRequest, DispatchResult, GenerationMode, NormalizedReply,
};

pub use dispatcher::{DispatchStrategy, Dispatcher};
pub use endpoints::{EndpointDescriptor, EndpointSet};
pub use executor::AttemptExecutor;
pub use normalize::normalize_reply;
pub use openrouter::{OpenRouterConfig, OpenRouterExecutor};
