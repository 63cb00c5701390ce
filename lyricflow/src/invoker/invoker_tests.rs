//! Tests for the stage invoker.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::errors::{ErrorClass, InvokeError, PermanentKind, TransientKind};
    use crate::invoker::{JitterStrategy, RetryNotice, RetryPolicy, StageInvoker};
    use crate::stages::CapabilityError;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(retries)
            .with_initial_delay_ms(100)
            .with_backoff_factor(2.0)
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.suggested_wait_buffer_ms, 1000);
        assert_eq!(policy.jitter, JitterStrategy::None);
    }

    #[test]
    fn test_delay_for_suggested_wait_adds_buffer() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_millis(2500))),
            Duration::from_millis(3500)
        );
    }

    #[test]
    fn test_delay_for_huge_suggested_wait_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, Some(Duration::MAX)), Duration::MAX);

        let huge_buffer = RetryPolicy::new().with_suggested_wait_buffer_ms(u64::MAX);
        assert!(huge_buffer.delay_for(0, Some(Duration::from_secs(u64::MAX))) >= Duration::from_secs(u64::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_retry_after_waits_until_cancelled() {
        let cancel = Arc::new(CancellationToken::new());
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel("gave up");
        });

        let result: Result<(), _> = StageInvoker::new(fast_policy(1))
            .invoke("analysis", &cancel, || async {
                Err(CapabilityError::rate_limited("slow").with_retry_after(Duration::MAX))
            })
            .await;

        assert!(matches!(result, Err(InvokeError::Cancelled { .. })), "got {result:?}");
    }

    #[test]
    fn test_delay_for_exponential_and_capped() {
        let policy = RetryPolicy::new()
            .with_initial_delay_ms(1000)
            .with_backoff_factor(2.0)
            .with_max_delay_ms(5000);

        assert_eq!(policy.delay_for(0, None), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2, None), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(u32::MAX, None), Duration::from_millis(5000));
    }

    #[test]
    fn test_delay_for_jitter_stays_in_bounds() {
        let full = RetryPolicy::new().with_initial_delay_ms(1000).with_jitter(JitterStrategy::Full);
        let equal = RetryPolicy::new().with_initial_delay_ms(1000).with_jitter(JitterStrategy::Equal);

        for _ in 0..50 {
            assert!(full.delay_for(0, None) <= Duration::from_millis(1000));
            let d = equal.delay_for(0, None);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_transient_calls_max_retries_plus_one() {
        let calls = AtomicU32::new(0);
        let invoker = StageInvoker::new(fast_policy(3));
        let cancel = CancellationToken::new();

        let result: Result<String, _> = invoker
            .invoke("analysis", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CapabilityError::new("503 Service Unavailable")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(InvokeError::Exhausted { error, attempts }) => {
                assert_eq!(attempts, 4);
                assert_eq!(error.class, ErrorClass::Transient(TransientKind::Unavailable));
                assert_eq!(error.stage, "analysis");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_calls_once() {
        let calls = AtomicU32::new(0);
        let invoker = StageInvoker::new(RetryPolicy::no_retry());

        let result: Result<(), _> = invoker
            .invoke("analysis", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CapabilityError::rate_limited("quota")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.unwrap_err().to_string().starts_with("API quota exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let invoker = StageInvoker::new(fast_policy(5));

        let result: Result<(), _> = invoker
            .invoke("critique", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CapabilityError::new("401 Unauthorized: API key invalid")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result {
            Err(InvokeError::Permanent(error)) => {
                assert_eq!(error.class, ErrorClass::Permanent(PermanentKind::Auth));
            }
            other => panic!("expected permanent failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_suggested_wait_is_honoured_with_buffer() {
        let calls = AtomicU32::new(0);
        let invoker = StageInvoker::new(RetryPolicy::default());
        let start = Instant::now();

        let invocation = invoker
            .invoke_observed("composition", &CancellationToken::new(), None, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(CapabilityError::new("429 RESOURCE_EXHAUSTED. Please retry in 2.5s."))
                    } else {
                        Ok("lyrics")
                    }
                }
            })
            .await
            .unwrap();

        let elapsed = start.elapsed();
        assert_eq!(invocation.value, "lyrics");
        assert_eq!(invocation.attempts, 2);
        assert!(elapsed >= Duration::from_millis(3500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3600), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_each_retry_with_backoff() {
        let notices: Arc<Mutex<Vec<RetryNotice>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        let observer = move |notice: &RetryNotice| sink.lock().push(notice.clone());
        let invoker = StageInvoker::new(fast_policy(3));

        let result: Result<_, _> = invoker
            .invoke_observed("enrichment", &CancellationToken::new(), Some(&observer), || async {
                Err::<(), _>(CapabilityError::unavailable("overloaded"))
            })
            .await;

        assert!(result.is_err());
        let notices = notices.lock();
        let delays: Vec<_> = notices.iter().map(|n| n.delay.as_millis()).collect();
        let remaining: Vec<_> = notices.iter().map(|n| n.remaining).collect();
        assert_eq!(delays, vec![100, 200, 400]);
        assert_eq!(remaining, vec![2, 1, 0]);
        assert!(notices[0].describe().contains("Retrying in 0.1s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let cancel = Arc::new(CancellationToken::new());
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel("user closed the page");
        });

        let invoker = StageInvoker::new(fast_policy(3).with_initial_delay_ms(60_000));
        let start = Instant::now();
        let result: Result<(), _> = invoker
            .invoke("analysis", &cancel, || async { Err(CapabilityError::rate_limited("429")) })
            .await;

        assert!(start.elapsed() < Duration::from_secs(60));
        match result {
            Err(InvokeError::Cancelled { stage, reason }) => {
                assert_eq!(stage, "analysis");
                assert_eq!(reason, "user closed the page");
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_token_prevents_any_call() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel("stop");

        let result: Result<(), _> = StageInvoker::default()
            .invoke("analysis", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(result, Err(InvokeError::Cancelled { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_is_retried_as_unavailable() {
        let calls = AtomicU32::new(0);
        let invoker = StageInvoker::new(fast_policy(1)).with_call_timeout(Some(Duration::from_secs(5)));

        let result: Result<(), _> = invoker
            .invoke("formatting", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.unwrap_err().code(), "SERVICE_UNAVAILABLE");
    }
}
