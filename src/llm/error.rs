//! Error types and retry policy for inference requests.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Coarse classification of an HTTP status returned by an inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429: the provider asked us to slow down
    RateLimited,
    /// 5xx: the provider is having trouble
    ServerError,
    /// Any other 4xx: our request is wrong, retrying will not help
    ClientError,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::ServerError => write!(f, "server_error"),
            Self::ClientError => write!(f, "client_error"),
        }
    }
}

/// Classify a non-success HTTP status code.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        500..=599 => LlmErrorKind::ServerError,
        _ => LlmErrorKind::ClientError,
    }
}

/// Failure of a single inference request, after transport retries.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("inference service unavailable: {0}")]
    Unavailable(String),

    #[error("inference request timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference service returned HTTP {status}: {body}")]
    BadResponse { status: u16, body: String },

    #[error("failed to parse inference response: {0}")]
    Parse(String),

    #[error("inference service returned an empty completion")]
    EmptyCompletion,
}

impl LlmError {
    /// Map a reqwest transport error onto the taxonomy.
    pub fn from_transport(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            LlmError::Timeout(timeout)
        } else if error.is_connect() {
            LlmError::Unavailable(format!("connection failed: {}", error))
        } else {
            LlmError::Unavailable(format!("request failed: {}", error))
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Unavailable(_) | LlmError::Timeout(_) => true,
            LlmError::BadResponse { status, .. } => {
                classify_http_status(*status) != LlmErrorKind::ClientError
            }
            LlmError::Parse(_) | LlmError::EmptyCompletion => false,
        }
    }
}

/// Transport-level retry policy: a small fixed number of attempts with
/// exponential backoff between them.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later attempt.
    pub base_delay: Duration,
    /// Upper bound for a single backoff sleep.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    /// Backoff to wait after the given zero-based failed attempt.
    ///
    /// Adds up to 10% jitter so concurrent runs do not hit the provider in lockstep.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_ceiling = delay.as_millis() as u64 / 10;
        if jitter_ceiling == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_ceiling);
        delay + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned to the caller.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!("{} succeeded after {} retries", label, attempt);
                    }
                    return Ok(value);
                }
                Err(error) if error.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{} attempt {}/{} failed, retrying in {:?}: {}",
                        label,
                        attempt + 1,
                        max_attempts,
                        delay,
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    tracing::error!(
                        "{} failed after {} attempt(s): {}",
                        label,
                        attempt + 1,
                        error
                    );
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_classify_http_status() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(401), LlmErrorKind::ClientError);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LlmError::Unavailable("refused".into()).is_retryable());
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(LlmError::BadResponse { status: 502, body: String::new() }.is_retryable());
        assert!(!LlmError::BadResponse { status: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::Parse("bad json".into()).is_retryable());
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        let first = config.delay_for(0);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(110));
        let second = config.delay_for(1);
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(220));
        let capped = config.delay_for(6);
        assert!(capped <= Duration::from_millis(330));
    }

    #[tokio::test]
    async fn test_run_surfaces_last_error_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), LlmError> = fast_retry(3)
            .run("attempt", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::Unavailable("down".into()))
            })
            .await;

        assert!(matches!(result, Err(LlmError::Unavailable(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_client_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), LlmError> = fast_retry(3)
            .run("attempt", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::BadResponse {
                    status: 401,
                    body: "unauthorized".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(LlmError::BadResponse { status: 401, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_recovers_after_transient_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast_retry(3)
            .run("attempt", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(LlmError::Timeout(Duration::from_millis(5)))
                } else {
                    Ok("done")
                }
            })
            .await;

        tokio_test::assert_ok!(result);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
