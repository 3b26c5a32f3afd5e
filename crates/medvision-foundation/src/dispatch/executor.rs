//! Attempt Executor Trait — The Seam Between Strategy and Transport
//!
//! This module defines **`AttemptExecutor`** — the object-safe interface that
//! isolates the dispatch strategies from how a single attempt is actually
//! performed. Both strategies drive the same executor unmodified:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                                │
//! │        SequentialFallback          ParallelRace                  │
//! └────────────────────────────┬─────────────────────────────────────┘
//!                              │  Arc<dyn AttemptExecutor>
//! ┌────────────────────────────┴─────────────────────────────────────┐
//! │                     AttemptExecutor Trait                        │
//! │    ┌───────────────────┐        ┌───────────────────────┐       │
//! │    │ OpenRouterExecutor│        │ scripted test doubles │       │
//! │    └───────────────────┘        └───────────────────────┘       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This separation is load-bearing: retries-across-endpoints live in the
//! strategy, exactly-one-network-call-per-invocation lives in the executor,
//! and neither knows about the other's internals.
//!
//! ## Object Safety & Concurrency
//!
//! The trait is object-safe so the dispatcher can hold
//! `Arc<dyn AttemptExecutor>` and the race strategy can share it across
//! spawned tokio tasks. All methods are `async` (via `#[async_trait]`) and
//! the trait requires `Send + Sync`.
//!
//! ## Infallible Signature
//!
//! `execute` returns an [`AttemptOutcome`] rather than a `Result`: every
//! failure mode is classified into the outcome's error taxonomy, so the
//! strategy layer folds outcomes uniformly instead of handling a second
//! error channel.

use async_trait::async_trait;

use super::endpoints::EndpointDescriptor;
use super::types::{AttemptOutcome, DispatchRequest, DispatchResult};

/// Performs exactly one bounded-time call to one endpoint.
///
/// Implementations must:
///
/// - make **exactly one** outbound call per `execute` invocation — no
///   internal retries (falling back across endpoints is the dispatcher's
///   concern);
/// - enforce a **per-attempt deadline** and classify expiry as
///   [`AttemptError::Timeout`](super::types::AttemptError::Timeout);
/// - classify every other failure into the
///   [`AttemptError`](super::types::AttemptError) taxonomy;
/// - on success, hand the raw payload to the result normalizer before
///   returning.
#[async_trait]
pub trait AttemptExecutor: Send + Sync {
    /// Human-readable executor name for logging.
    fn name(&self) -> &str;

    /// Verify fatal preconditions (e.g. a configured credential) without
    /// performing any network I/O. The dispatcher calls this once per
    /// dispatch, before any attempt is made.
    fn ready(&self) -> DispatchResult<()>;

    /// Perform one attempt against one endpoint and report its outcome.
    async fn execute(
        &self,
        endpoint: &EndpointDescriptor,
        request: &DispatchRequest,
    ) -> AttemptOutcome;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time verification that `AttemptExecutor` is object-safe.
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn AttemptExecutor) {}

    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_trait_bounds() {
        // If this compiles, the trait can be shared across tokio tasks
        // via Arc<dyn AttemptExecutor>.
        assert_send_sync::<Box<dyn AttemptExecutor>>();
    }
}
