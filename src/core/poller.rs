//! Exponential-backoff polling for long-running backend operations.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The probe itself failed; polling stops at the first failure.
    #[error("operation probe failed: {0}")]
    Probe(E),
    #[error("operation did not complete after {attempts} attempts ({elapsed:?})")]
    DeadlineExceeded { attempts: u32, elapsed: Duration },
}

/// Repeatedly probes until it yields a value, doubling the delay between attempts.
///
/// The delay before retry `n` (zero-based) is `min(initial_delay * 2^n, max_delay)`. Polling gives
/// up once `master_timeout` has elapsed or `max_attempts` probes have returned nothing.
#[derive(Debug, Clone)]
pub struct ExponentialBackoffPoller {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub master_timeout: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ExponentialBackoffPoller {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            master_timeout: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

impl ExponentialBackoffPoller {
    pub fn new(initial_delay: Duration, max_delay: Duration, master_timeout: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            master_timeout,
            max_attempts: None,
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    fn delay(&self, retry: u32) -> Duration {
        let multiplier = 1u32 << retry.min(16);
        self.initial_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    pub async fn poll<T, E, F, Fut>(&self, mut probe: F) -> Result<T, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let started = Instant::now();
        let deadline = started + self.master_timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            debug!(attempt = attempts, "polling operation");
            if let Some(value) = probe().await.map_err(PollError::Probe)? {
                return Ok(value);
            }

            let delay = self.delay(attempts - 1);
            let exhausted = self.max_attempts.is_some_and(|max| attempts >= max);
            if exhausted || Instant::now() + delay > deadline {
                return Err(PollError::DeadlineExceeded {
                    attempts,
                    elapsed: started.elapsed(),
                });
            }

            debug!(attempt = attempts, ?delay, "operation pending; backing off");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn test_poll_resolves_after_pending_attempts() {
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::default();
        let poller = ExponentialBackoffPoller::default();

        let recorded = calls.clone();
        let result: Result<&str, PollError<()>> = poller
            .poll(|| {
                let recorded = recorded.clone();
                async move {
                    let mut calls = recorded.lock().unwrap();
                    calls.push(Instant::now());
                    Ok(if calls.len() < 3 { None } else { Some("done") })
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert_eq!(first_gap, Duration::from_secs(1));
        assert_eq!(second_gap, Duration::from_secs(2));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_propagates_probe_failure_immediately() {
        let attempts = Arc::new(Mutex::new(0));
        let poller = ExponentialBackoffPoller::default();

        let counter = attempts.clone();
        let result: Result<(), PollError<&str>> = poller
            .poll(|| {
                let counter = counter.clone();
                async move {
                    *counter.lock().unwrap() += 1;
                    Err("transport failure")
                }
            })
            .await;

        assert!(matches!(result, Err(PollError::Probe("transport failure"))));
        assert_eq!(*attempts.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up_at_master_timeout() {
        let poller = ExponentialBackoffPoller::default();
        let started = Instant::now();

        let result: Result<(), PollError<()>> = poller.poll(|| async { Ok(None) }).await;

        match result {
            Err(PollError::DeadlineExceeded { attempts, .. }) => assert!(attempts > 1),
            other => panic!("expected deadline, got {:?}", other),
        }
        assert!(started.elapsed() <= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_respects_attempt_ceiling() {
        let poller = ExponentialBackoffPoller::default().max_attempts(2);
        let result: Result<(), PollError<()>> = poller.poll(|| async { Ok(None) }).await;
        assert!(matches!(result, Err(PollError::DeadlineExceeded { attempts: 2, .. })));
    }

    #[test]
    fn test_delay_is_capped() {
        let poller = ExponentialBackoffPoller::default();
        assert_eq!(poller.delay(0), Duration::from_secs(1));
        assert_eq!(poller.delay(1), Duration::from_secs(2));
        assert_eq!(poller.delay(3), Duration::from_secs(8));
        assert_eq!(poller.delay(4), Duration::from_secs(10));
        assert_eq!(poller.delay(40), Duration::from_secs(10));
    }
}
