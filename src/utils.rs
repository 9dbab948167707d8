use crate::llm::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, warn};

pub const SNIPPET_CHARS: usize = 50;

/// Timeout and backoff applied to each model in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the given 1-based attempt, plus up to 50% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let base = self.base_delay.saturating_mul(factor);
        let spread = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = if spread == 0 {
            0
        } else {
            fastrand::u64(0..=spread)
        };
        base.saturating_add(Duration::from_millis(jitter))
    }
}

/// Run `f` under the policy's timeout, retrying retryable failures.
pub async fn retry<F, Fut, T>(label: &str, policy: &RetryPolicy, mut f: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempts = policy.max_retries.saturating_add(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match policy.timeout {
            Some(limit) => match timeout(limit, f()).await {
                Ok(inner) => inner,
                Err(_) => Err(ProviderError::Timeout(limit)),
            },
            None => f().await,
        };
        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && e.is_retryable() => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} attempt {}/{} failed: {}. Retrying in {}ms",
                    label,
                    attempt,
                    attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
            }
            Err(e) => {
                error!("{} failed after {} attempt(s): {}", label, attempt, e);
                return Err(e);
            }
        }
    }
}

/// Number of `\n`-separated segments, so an empty snippet counts as one line.
pub fn line_count(code: &str) -> u32 {
    u32::try_from(code.split('\n').count()).unwrap_or(u32::MAX)
}

/// First characters of the code, for history rows.
pub fn snippet(code: &str) -> String {
    let head: String = code.chars().take(SNIPPET_CHARS).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_retries: u32, timeout: Option<Duration>) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            timeout,
        }
    }

    #[test]
    fn counts_lines_like_a_split() {
        assert_eq!(line_count(""), 1);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\nb"), 2);
        assert_eq!(line_count("a\n"), 2);
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        assert_eq!(snippet("let x = 1;"), "let x = 1;...");
        let long = "é".repeat(80);
        assert_eq!(snippet(&long).chars().count(), SNIPPET_CHARS + 3);
    }

    #[test]
    fn delay_grows_and_stays_within_jitter() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            timeout: None,
        };
        for _ in 0..20 {
            let first = policy.delay_for(1);
            assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
            let third = policy.delay_for(3);
            assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(600));
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry("flaky", &quick(2, None), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::MissingContent)
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry("broken", &quick(2, None), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::MissingContent)
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry("rejected", &quick(5, None), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                body: "no such model".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeouts_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry("slow", &quick(1, Some(Duration::from_millis(5))), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(err.to_string().contains("timeout"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
