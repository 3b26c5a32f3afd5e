//! Strategy Test Suite — Sequential Fallback vs Parallel Race
//!
//! This suite drives both dispatch strategies through the same
//! `AttemptExecutor` seam the production executor implements, proving they
//! are:
//!
//! 1. **Interchangeable** — one scripted executor serves both strategies
//! 2. **Single-resolution** — exactly one reply or one terminal error per
//!    dispatch, never more
//! 3. **Faithful aggregators** — one recorded failure per failed candidate,
//!    in attempt-completion order
//!
//! The timeout boundary test runs against a real socket that accepts
//! connections and never answers, so deadline expiry is classified by the
//! production executor itself.

#[cfg(test)]
mod strategy_tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;

    use medvision_foundation::dispatch::dispatcher::{DispatchStrategy, Dispatcher};
    use medvision_foundation::dispatch::endpoints::{EndpointDescriptor, EndpointSet};
    use medvision_foundation::dispatch::executor::AttemptExecutor;
    use medvision_foundation::dispatch::openrouter::{OpenRouterConfig, OpenRouterExecutor};
    use medvision_foundation::dispatch::types::{
        AttemptError, AttemptOutcome, ChatMessage, DispatchError, DispatchRequest, DispatchResult,
        GenerationMode, NormalizedReply,
    };

    // ========================================================================
    // Scripted Executor
    // ========================================================================

    /// What one scripted endpoint does when attempted.
    #[derive(Clone)]
    struct ScriptedAttempt {
        delay: Duration,
        result: Result<NormalizedReply, AttemptError>,
    }

    /// An executor whose attempts settle according to a per-endpoint script,
    /// recording every invocation.
    struct ScriptedExecutor {
        script: HashMap<String, ScriptedAttempt>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new() -> Self {
            Self {
                script: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn succeeds(mut self, id: &str, delay_ms: u64, text: &str) -> Self {
            self.script.insert(
                id.to_string(),
                ScriptedAttempt {
                    delay: Duration::from_millis(delay_ms),
                    result: Ok(NormalizedReply::Text {
                        text: text.to_string(),
                    }),
                },
            );
            self
        }

        fn fails(mut self, id: &str, delay_ms: u64, error: AttemptError) -> Self {
            self.script.insert(
                id.to_string(),
                ScriptedAttempt {
                    delay: Duration::from_millis(delay_ms),
                    result: Err(error),
                },
            );
            self
        }

        /// Endpoint ids in invocation order.
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AttemptExecutor for ScriptedExecutor {
        fn name(&self) -> &str {
            "scripted"
        }

        fn ready(&self) -> DispatchResult<()> {
            Ok(())
        }

        async fn execute(
            &self,
            endpoint: &EndpointDescriptor,
            _request: &DispatchRequest,
        ) -> AttemptOutcome {
            self.calls.lock().unwrap().push(endpoint.id.clone());
            let attempt = self
                .script
                .get(&endpoint.id)
                .expect("attempted an unscripted endpoint")
                .clone();

            let started = Instant::now();
            tokio::time::sleep(attempt.delay).await;

            AttemptOutcome {
                endpoint: endpoint.id.clone(),
                elapsed: started.elapsed(),
                result: attempt.result,
            }
        }
    }

    /// Helper: text-mode catalog over the given endpoint ids, in order.
    fn catalog(ids: &[&str]) -> EndpointSet {
        let text = ids
            .iter()
            .enumerate()
            .map(|(tier, id)| EndpointDescriptor::new(*id, tier))
            .collect();
        EndpointSet::new(text, vec![])
    }

    /// Helper: a minimal one-message text request.
    fn request() -> DispatchRequest {
        DispatchRequest::new(vec![ChatMessage::user("What is the capital of France?")])
    }

    // ========================================================================
    // Sequential Fallback
    // ========================================================================

    #[tokio::test]
    async fn sequential_stops_at_first_success() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .fails("model-a", 1, AttemptError::Http { status: 429, detail: "rate limited".into() })
                .succeeds("model-b", 1, "from b")
                .succeeds("model-c", 1, "from c"),
        );
        let dispatcher = Dispatcher::new(
            executor.clone(),
            catalog(&["model-a", "model-b", "model-c"]),
            DispatchStrategy::SequentialFallback,
        );

        let reply = dispatcher.dispatch(&request()).await.unwrap();
        assert_eq!(reply, NormalizedReply::Text { text: "from b".to_string() });

        // Exactly A then B were attempted; C never was.
        assert_eq!(executor.calls(), vec!["model-a", "model-b"]);
    }

    #[tokio::test]
    async fn sequential_aggregates_every_failure_in_attempt_order() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .fails("model-a", 1, AttemptError::Http { status: 503, detail: "unavailable".into() })
                .fails("model-b", 1, AttemptError::EmptyResponse)
                .fails("model-c", 1, AttemptError::UpstreamRejected("overloaded".into())),
        );
        let dispatcher = Dispatcher::new(
            executor,
            catalog(&["model-a", "model-b", "model-c"]),
            DispatchStrategy::SequentialFallback,
        );

        let err = dispatcher.dispatch(&request()).await.unwrap_err();
        let failures = err.failures();

        // One recorded failure per candidate, kinds preserved, in order.
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].endpoint, "model-a");
        assert!(matches!(failures[0].error, AttemptError::Http { status: 503, .. }));
        assert_eq!(failures[1].error, AttemptError::EmptyResponse);
        assert_eq!(
            failures[2].error,
            AttemptError::UpstreamRejected("overloaded".to_string())
        );
    }

    // ========================================================================
    // Parallel Race
    // ========================================================================

    #[tokio::test]
    async fn race_fastest_success_wins() {
        // A would succeed too, but B settles first; A's outcome must not
        // affect the returned value.
        let executor = Arc::new(
            ScriptedExecutor::new()
                .succeeds("model-a", 500, "from a")
                .succeeds("model-b", 50, "from b"),
        );
        let dispatcher = Dispatcher::new(
            executor.clone(),
            catalog(&["model-a", "model-b"]),
            DispatchStrategy::ParallelRace,
        );

        let started = Instant::now();
        let reply = dispatcher.dispatch(&request()).await.unwrap();

        assert_eq!(reply, NormalizedReply::Text { text: "from b".to_string() });
        // The dispatch resolved on B's completion, not A's.
        assert!(started.elapsed() < Duration::from_millis(450));
        // Both candidates were fired at dispatch start.
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test]
    async fn race_slow_success_beats_fast_failures() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .fails("model-a", 10, AttemptError::Http { status: 500, detail: "boom".into() })
                .fails("model-b", 20, AttemptError::EmptyResponse)
                .succeeds("model-c", 120, "from c"),
        );
        let dispatcher = Dispatcher::new(
            executor,
            catalog(&["model-a", "model-b", "model-c"]),
            DispatchStrategy::ParallelRace,
        );

        let reply = dispatcher.dispatch(&request()).await.unwrap();
        assert_eq!(reply, NormalizedReply::Text { text: "from c".to_string() });
    }

    #[tokio::test]
    async fn race_aggregates_failures_in_completion_order() {
        // Launch order is A then B; completion order is B then A.
        let executor = Arc::new(
            ScriptedExecutor::new()
                .fails("model-a", 200, AttemptError::Timeout { after: Duration::from_millis(200) })
                .fails("model-b", 20, AttemptError::Http { status: 429, detail: "rate limited".into() }),
        );
        let dispatcher = Dispatcher::new(
            executor,
            catalog(&["model-a", "model-b"]),
            DispatchStrategy::ParallelRace,
        );

        let err = dispatcher.dispatch(&request()).await.unwrap_err();
        let failures = err.failures();

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].endpoint, "model-b");
        assert_eq!(failures[1].endpoint, "model-a");
    }

    #[tokio::test]
    async fn race_with_near_simultaneous_successes_surfaces_one_reply() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .succeeds("model-a", 30, "from a")
                .succeeds("model-b", 31, "from b"),
        );
        let dispatcher = Dispatcher::new(
            executor,
            catalog(&["model-a", "model-b"]),
            DispatchStrategy::ParallelRace,
        );

        // First-completed wins by strict completion-event ordering; a single
        // value comes back either way.
        let reply = dispatcher.dispatch(&request()).await.unwrap();
        assert!(matches!(reply, NormalizedReply::Text { .. }));
    }

    // ========================================================================
    // Shared Edge Cases
    // ========================================================================

    #[tokio::test]
    async fn empty_candidate_set_fails_with_empty_aggregate() {
        for strategy in [DispatchStrategy::SequentialFallback, DispatchStrategy::ParallelRace] {
            let dispatcher = Dispatcher::new(
                Arc::new(ScriptedExecutor::new()),
                EndpointSet::new(vec![], vec![]),
                strategy,
            );

            let err = dispatcher.dispatch(&request()).await.unwrap_err();
            assert_eq!(err, DispatchError::AllEndpointsFailed(vec![]));
        }
    }

    #[tokio::test]
    async fn mode_selects_candidate_list() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .succeeds("text-model", 1, "text reply")
                .succeeds("image-model", 1, "image reply"),
        );
        let endpoints = EndpointSet::new(
            vec![EndpointDescriptor::new("text-model", 0)],
            vec![EndpointDescriptor::new("image-model", 0)],
        );
        let dispatcher = Dispatcher::new(
            executor.clone(),
            endpoints,
            DispatchStrategy::SequentialFallback,
        );

        let image_request = request().with_mode(GenerationMode::Image);
        dispatcher.dispatch(&image_request).await.unwrap();

        assert_eq!(executor.calls(), vec!["image-model"]);
    }

    // ========================================================================
    // Production Executor Boundaries
    // ========================================================================

    #[tokio::test]
    async fn missing_credential_is_raised_before_any_attempt() {
        let executor = Arc::new(OpenRouterExecutor::new(OpenRouterConfig::new("")));
        let dispatcher = Dispatcher::new(
            executor,
            EndpointSet::openrouter_free_tier(),
            DispatchStrategy::SequentialFallback,
        );

        let err = dispatcher.dispatch(&request()).await.unwrap_err();
        assert_eq!(err, DispatchError::MissingCredential);
    }

    #[tokio::test]
    async fn unresponsive_endpoint_is_classified_timeout_not_http() {
        // A socket that accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                // Hold the connection open without replying.
                let mut sink = Vec::new();
                use tokio::io::AsyncReadExt;
                let _ = socket.read_to_end(&mut sink).await;
            }
        });

        let config = OpenRouterConfig::new("test-key")
            .with_url(format!("http://{}/v1/chat/completions", address))
            .with_attempt_timeout(Duration::from_millis(150));
        let dispatcher = Dispatcher::new(
            Arc::new(OpenRouterExecutor::new(config)),
            EndpointSet::new(vec![EndpointDescriptor::new("silent-model", 0)], vec![]),
            DispatchStrategy::SequentialFallback,
        );

        let err = dispatcher.dispatch(&request()).await.unwrap_err();
        let failures = err.failures();

        assert_eq!(failures.len(), 1);
        assert!(
            matches!(failures[0].error, AttemptError::Timeout { .. }),
            "expected Timeout, got {:?}",
            failures[0].error,
        );
    }
}
