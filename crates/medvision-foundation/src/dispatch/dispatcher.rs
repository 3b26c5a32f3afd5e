//! Dispatcher — Policy-Driven Strategy over Unreliable Endpoints
//!
//! This module implements the **strategy-driven dispatcher** for upstream
//! model endpoints. It is the "brain" that turns one caller request into
//! one normalized reply despite any subset of the candidate endpoints being
//! slow, queued, erroring, or returning malformed payloads.
//!
//! ## Strategy Trade-Off
//!
//! Both strategies drive the same [`AttemptExecutor`] and the same
//! candidate list; they differ only in how attempts are scheduled:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      DispatchRequest arrives                     │
//! └───────────────┬──────────────────────────────┬───────────────────┘
//!                 │ SequentialFallback           │ ParallelRace
//!                 ▼                              ▼
//!       ┌──────────────────┐          ┌─────────────────────────┐
//!       │ try candidate 0  │          │ fire ALL candidates now │
//!       │   failed? next   │          │ first success wins      │
//!       │ first success ──▶│          │ losers drain in the     │
//!       │   stop, return   │          │ background              │
//!       └──────────────────┘          └─────────────────────────┘
//!
//!   minimal cost/load when an          minimal latency when the
//!   early candidate succeeds           head of the list is degraded
//! ```
//!
//! ## At-Most-One Winner
//!
//! The central correctness property: however many attempts are outstanding,
//! at most one winning value is ever surfaced. Sequential trivially
//! satisfies this (one attempt in flight at a time); race satisfies it
//! because a single receive loop resolves the dispatch exactly once, on the
//! first successful completion event.
//!
//! ## Losing Attempts
//!
//! Race-mode losers are not force-killed. Each attempt runs in its own
//! tokio task and is bounded by the executor's per-attempt deadline; once a
//! winner is selected the aggregation channel closes and losing outcomes
//! are discarded on send. Upstream calls finish naturally, keeping
//! connection teardown orderly.
//!
//! ## Thread Safety
//!
//! `Dispatcher` is `Send + Sync` and can be shared across tokio tasks via
//! `Arc`. Dispatching takes `&self`; reconfiguration (`set_strategy`,
//! `set_endpoints`) takes `&mut self`.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::endpoints::{EndpointDescriptor, EndpointSet};
use super::executor::AttemptExecutor;
use super::types::{
    AttemptFailure, DispatchError, DispatchRequest, DispatchResult, NormalizedReply,
};

// ============================================================================
// DispatchStrategy
// ============================================================================

/// How the dispatcher schedules attempts over the candidate list.
///
/// Expressed as configuration, not as duplicated code paths: both variants
/// share the executor, the normalizer, and the failure aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// Walk candidates in order, one attempt in flight at a time; the first
    /// success halts further attempts. Minimizes cost and upstream load
    /// when an early candidate is healthy.
    SequentialFallback,

    /// Fire every candidate concurrently at dispatch start; the first
    /// success wins and losers drain in the background. Minimizes latency
    /// when the head of the candidate list is degraded.
    ParallelRace,
}

impl Default for DispatchStrategy {
    fn default() -> Self {
        Self::SequentialFallback
    }
}

impl DispatchStrategy {
    /// Read the strategy from `DISPATCH_STRATEGY` (`"race"` or
    /// `"parallel"` select [`Self::ParallelRace`]); anything else, or an
    /// unset variable, selects [`Self::SequentialFallback`].
    pub fn from_env() -> Self {
        match std::env::var("DISPATCH_STRATEGY")
            .map(|raw| raw.trim().to_ascii_lowercase())
            .ok()
            .as_deref()
        {
            Some("race") | Some("parallel") => Self::ParallelRace,
            _ => Self::SequentialFallback,
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Strategy-driven dispatcher: one request in, one normalized reply or one
/// terminal error out.
///
/// ## Usage
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use medvision_foundation::dispatch::dispatcher::{DispatchStrategy, Dispatcher};
/// use medvision_foundation::dispatch::endpoints::EndpointSet;
/// use medvision_foundation::dispatch::openrouter::OpenRouterExecutor;
/// use medvision_foundation::dispatch::types::{ChatMessage, DispatchRequest};
///
/// let executor = Arc::new(OpenRouterExecutor::try_from_env()?);
/// let dispatcher = Dispatcher::new(
///     executor,
///     EndpointSet::openrouter_free_tier(),
///     DispatchStrategy::from_env(),
/// );
///
/// let request = DispatchRequest::new(vec![ChatMessage::user("What is hypertension?")]);
/// let reply = dispatcher.dispatch(&request).await?;
/// ```
pub struct Dispatcher {
    /// Performs one bounded attempt per endpoint; shared by both strategies.
    executor: Arc<dyn AttemptExecutor>,

    /// The ordered candidate catalog, per mode.
    endpoints: EndpointSet,

    /// The active scheduling strategy.
    strategy: DispatchStrategy,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("executor", &self.executor.name())
            .field("strategy", &self.strategy)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// # Arguments
    /// * `executor` — performs one bounded attempt per endpoint
    /// * `endpoints` — the ordered candidate catalog
    /// * `strategy` — sequential fallback or parallel race
    pub fn new(
        executor: Arc<dyn AttemptExecutor>,
        endpoints: EndpointSet,
        strategy: DispatchStrategy,
    ) -> Self {
        tracing::info!(
            "Dispatcher: initialized with strategy={:?}, executor={}",
            strategy,
            executor.name(),
        );

        Self {
            executor,
            endpoints,
            strategy,
        }
    }

    /// The active strategy.
    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    /// Change the strategy at runtime.
    pub fn set_strategy(&mut self, strategy: DispatchStrategy) {
        tracing::info!("Dispatcher: strategy changed to {:?}", strategy);
        self.strategy = strategy;
    }

    /// Swap the candidate catalog at runtime, without restart.
    pub fn set_endpoints(&mut self, endpoints: EndpointSet) {
        tracing::info!("Dispatcher: endpoint catalog replaced");
        self.endpoints = endpoints;
    }

    // ========================================================================
    // Core Dispatch Logic
    // ========================================================================

    /// Resolve one request into one normalized reply or one terminal error.
    ///
    /// Preconditions are checked before any attempt is made: the executor
    /// must hold a credential and the request must carry at least one
    /// message. After that, the active strategy schedules attempts until
    /// one succeeds or every candidate has failed; individual failures are
    /// logged and folded into the terminal aggregate, never surfaced alone.
    ///
    /// There is no outer deadline across attempts and no whole-dispatch
    /// retry; both are caller policy.
    pub async fn dispatch(&self, request: &DispatchRequest) -> DispatchResult<NormalizedReply> {
        self.executor.ready()?;

        if request.messages.is_empty() {
            return Err(DispatchError::InvalidRequest(
                "request must contain at least one message".to_string(),
            ));
        }

        let candidates = self.endpoints.candidates(request.mode);
        tracing::debug!(
            "Dispatcher: dispatching mode={} across {} candidate(s) with {:?}",
            request.mode.as_str(),
            candidates.len(),
            self.strategy,
        );

        let result = match self.strategy {
            DispatchStrategy::SequentialFallback => {
                self.dispatch_sequential(candidates, request).await
            }
            DispatchStrategy::ParallelRace => self.dispatch_race(candidates, request).await,
        };

        if let Err(DispatchError::AllEndpointsFailed(failures)) = &result {
            tracing::error!(
                "Dispatcher: all {} candidate(s) failed for mode={}",
                failures.len(),
                request.mode.as_str(),
            );
        }

        result
    }

    /// Head-of-line strategy: one attempt at a time, first success stops.
    async fn dispatch_sequential(
        &self,
        candidates: &[EndpointDescriptor],
        request: &DispatchRequest,
    ) -> DispatchResult<NormalizedReply> {
        let mut failures = Vec::with_capacity(candidates.len());

        for endpoint in candidates {
            let outcome = self.executor.execute(endpoint, request).await;
            match outcome.result {
                Ok(reply) => {
                    tracing::info!(
                        "Dispatcher: '{}' answered in {:?} ({} earlier failure(s))",
                        outcome.endpoint,
                        outcome.elapsed,
                        failures.len(),
                    );
                    return Ok(reply);
                }
                Err(error) => {
                    tracing::warn!(
                        "Dispatcher: '{}' failed ({}), trying next candidate",
                        outcome.endpoint,
                        error,
                    );
                    failures.push(AttemptFailure {
                        endpoint: outcome.endpoint,
                        error,
                        elapsed: outcome.elapsed,
                    });
                }
            }
        }

        Err(DispatchError::AllEndpointsFailed(failures))
    }

    /// Race strategy: every candidate fires at once, first success wins.
    ///
    /// Each attempt runs in its own tokio task and reports into an mpsc
    /// channel — the append-only outcome aggregator, ordered by completion.
    /// The receive loop resolves the dispatch on the first success; after
    /// that the channel is closed and losing attempts drain in the
    /// background, their outcomes discarded on send.
    async fn dispatch_race(
        &self,
        candidates: &[EndpointDescriptor],
        request: &DispatchRequest,
    ) -> DispatchResult<NormalizedReply> {
        let (outcome_tx, mut outcome_rx) = mpsc::channel(candidates.len().max(1));

        for endpoint in candidates {
            let executor = Arc::clone(&self.executor);
            let endpoint = endpoint.clone();
            let request = request.clone();
            let outcome_tx = outcome_tx.clone();

            tokio::spawn(async move {
                let outcome = executor.execute(&endpoint, &request).await;
                // Fails once a winner has closed the channel; losing
                // outcomes are dropped here.
                let _ = outcome_tx.send(outcome).await;
            });
        }
        drop(outcome_tx);

        // Completion order, not launch order; nondeterministic by nature.
        let mut failures = Vec::with_capacity(candidates.len());
        while let Some(outcome) = outcome_rx.recv().await {
            match outcome.result {
                Ok(reply) => {
                    tracing::info!(
                        "Dispatcher: race won by '{}' in {:?} ({} loser(s) still draining)",
                        outcome.endpoint,
                        outcome.elapsed,
                        candidates.len() - failures.len() - 1,
                    );
                    return Ok(reply);
                }
                Err(error) => {
                    tracing::warn!(
                        "Dispatcher: '{}' dropped out of the race ({})",
                        outcome.endpoint,
                        error,
                    );
                    failures.push(AttemptFailure {
                        endpoint: outcome.endpoint,
                        error,
                        elapsed: outcome.elapsed,
                    });
                }
            }
        }

        Err(DispatchError::AllEndpointsFailed(failures))
    }
}

// ============================================================================
// Tests
// ============================================================================
