//! Text-generation capability: trait, pacing/retry wrapper, HTTP backend.

pub mod http;

pub use http::HttpTextGenerator;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::types::CourseError;

/// Capability trait for the external text-generation backend.
///
/// Fallible and rate-limited; callers go through [`PacedGenerator`] rather
/// than hitting an implementation directly.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CourseError>;
}

/// Injectable sleep so tests never wait in wall-clock time.
pub type SleepFn = Arc<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Bounded retry and pacing parameters for generation calls.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Ceiling on the exponential backoff, bounding total wait.
    pub max_backoff: Duration,
    /// Fixed delay enforced between successive generation calls.
    pub pacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(4),
            pacing: Duration::from_millis(500),
        }
    }
}

/// Serializes calls to an inner generator, spacing them out and retrying
/// failures with exponential backoff.
///
/// The external backend is rate-limited, so calls are never fanned out:
/// a mutex admits one in-flight call at a time and the pacing delay is
/// enforced between consecutive admissions.
pub struct PacedGenerator {
    inner: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
    last_call: Mutex<Option<Instant>>,
    sleep: SleepFn,
}

impl PacedGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            last_call: Mutex::new(None),
            sleep: Arc::new(|duration| Box::pin(tokio::time::sleep(duration))),
        }
    }

    /// Replaces the sleep function, for tests.
    #[must_use]
    pub fn with_sleep(mut self, sleep: SleepFn) -> Self {
        self.sleep = sleep;
        self
    }
}

#[async_trait]
impl TextGenerator for PacedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, CourseError> {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let since = previous.elapsed();
            if since < self.policy.pacing {
                (self.sleep)(self.policy.pacing - since).await;
            }
        }

        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 0u32;
        let result = loop {
            attempt += 1;
            match self.inner.generate(prompt).await {
                Ok(text) => break Ok(text),
                Err(err) if attempt < self.policy.max_attempts => {
                    tracing::warn!(attempt, error = %err, "generation attempt failed, backing off");
                    (self.sleep)(backoff).await;
                    backoff = (backoff * 2).min(self.policy.max_backoff);
                }
                Err(err) => break Err(err),
            }
        };

        *last_call = Some(Instant::now());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyGenerator {
        remaining_failures: AtomicU32,
    }

    #[async_trait]
    impl TextGenerator for FlakyGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, CourseError> {
            let should_fail = self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                Err(CourseError::Generation("rate limited".into()))
            } else {
                Ok("ok".to_string())
            }
        }
    }

    fn instant_sleep(log: Arc<std::sync::Mutex<Vec<Duration>>>) -> SleepFn {
        Arc::new(move |duration| {
            log.lock().unwrap().push(duration);
            Box::pin(async {})
        })
    }

    #[tokio::test]
    async fn retries_then_succeeds_without_wall_clock_waits() {
        let inner = Arc::new(FlakyGenerator {
            remaining_failures: AtomicU32::new(2),
        });
        let sleeps = Arc::new(std::sync::Mutex::new(Vec::new()));
        let paced = PacedGenerator::new(inner, RetryPolicy::default())
            .with_sleep(instant_sleep(sleeps.clone()));

        let out = paced.generate("prompt").await.unwrap();
        assert_eq!(out, "ok");
        // Two failures -> two backoff sleeps, doubling.
        let recorded = sleeps.lock().unwrap().clone();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0], Duration::from_millis(500));
        assert_eq!(recorded[1], Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let inner = Arc::new(FlakyGenerator {
            remaining_failures: AtomicU32::new(10),
        });
        let sleeps = Arc::new(std::sync::Mutex::new(Vec::new()));
        let paced = PacedGenerator::new(inner, RetryPolicy::default())
            .with_sleep(instant_sleep(sleeps.clone()));

        let err = paced.generate("prompt").await.unwrap_err();
        assert!(matches!(err, CourseError::Generation(_)));
        assert_eq!(sleeps.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn paces_successive_calls() {
        let inner = Arc::new(FlakyGenerator {
            remaining_failures: AtomicU32::new(0),
        });
        let sleeps = Arc::new(std::sync::Mutex::new(Vec::new()));
        let paced = PacedGenerator::new(inner, RetryPolicy::default())
            .with_sleep(instant_sleep(sleeps.clone()));

        paced.generate("one").await.unwrap();
        paced.generate("two").await.unwrap();
        // The second call observes the first call's completion stamp and
        // requests a pacing sleep.
        assert_eq!(sleeps.lock().unwrap().len(), 1);
    }
}
