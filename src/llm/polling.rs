use super::LlmError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Backoff for long-running operations: the delay doubles after every
/// check, capped at `max_delay`, for at most `max_attempts` checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_attempts: 30,
        }
    }
}

impl PollPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Call `check` after each backoff delay until it yields a value.
///
/// `check` returns `Ok(None)` while the operation is still running. A fired
/// `cancel` token ends the wait with `LlmError::Cancelled`; only the local
/// wait stops, nothing is cancelled server-side.
pub async fn poll_until_done<T, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, LlmError>>,
{
    for attempt in 0..policy.max_attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            _ = tokio::time::sleep(policy.delay_for(attempt)) => {}
        }

        if let Some(done) = check().await? {
            return Ok(done);
        }
        debug!(attempt, "operation still running");
    }
    Err(LlmError::Timeout {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy() -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_attempts: 6,
        }
    }

    #[test]
    fn delay_doubles_up_to_cap() {
        let delays: Vec<_> = (0..5).map(|a| policy().delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        assert_eq!(policy().delay_for(u32::MAX), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_operation_is_done() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let counter = Arc::clone(&calls);
        let result = poll_until_done(&policy(), &CancellationToken::new(), move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((n == 3).then_some("video"))
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "video");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1 + 2 + 4), "{:?}", waited);
        assert!(waited < Duration::from_secs(8), "{:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let err = poll_until_done(&policy(), &CancellationToken::new(), || async {
            Ok::<Option<()>, LlmError>(None)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LlmError::Timeout { attempts: 6 }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_waiting() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let err = poll_until_done(&policy(), &cancel, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<Option<()>, LlmError>(None) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LlmError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn check_errors_propagate() {
        let policy = PollPolicy {
            initial_delay: Duration::from_millis(1),
            ..policy()
        };
        let err = poll_until_done(&policy, &CancellationToken::new(), || async {
            Err::<Option<()>, _>(LlmError::Parse("bad operation".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }
}
