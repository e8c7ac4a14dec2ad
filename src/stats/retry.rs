//! Bounded exponential-backoff retry around a single outbound request.
//!
//! Retries cover transient failures only: network and timeout errors, 429,
//! and the configured set of 5xx codes. Any other status is terminal and
//! returned immediately. When the failure was a 429, the delay before the
//! next attempt is the longer of the backoff delay and the rate tracker's
//! reported wait.

use super::error::FetchError;
use super::rate::RateTracker;
use crate::config::StatsConfig;
use core::time::Duration;
use reqwest::header::HeaderMap;

const LOG_TARGET: &str = "     retry";

/// Ceiling for a single backoff delay.
const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(60);

/// Fallback wait for a 429 that carries no usable reset signal.
const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(5);

/// Status codes for which re-attempting the same request may succeed.
const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// Ephemeral record of one attempt within a single [`RetryPolicy::execute`]
/// invocation. Logged, never persisted.
#[derive(Debug)]
struct FetchAttempt {
    number: u32,
    delay_before: Duration,
    status: Option<u16>,
    error: String,
}

/// Retry configuration applied to every outbound request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    backoff_multiplier: f64,
    jitter: bool,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &StatsConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            attempt_timeout: config.attempt_timeout,
        }
    }

    /// Execute `request`, retrying transient failures with exponential
    /// backoff. Performs at most `max_retries + 1` attempts, each under its
    /// own timeout. Every response seen along the way is folded into `rate`.
    pub async fn execute<F, Fut>(&self, rate: &RateTracker, request: F) -> Result<reqwest::Response, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let error = match tokio::time::timeout(self.attempt_timeout, request()).await {
                Err(_) => FetchError::Network("attempt timed out".to_string()),
                Ok(Err(e)) => FetchError::from_transport(&e),
                Ok(Ok(resp)) => {
                    rate.record_response(resp.headers());
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    classify_status(status.as_u16(), resp.headers(), rate)
                }
            };

            if !self.should_retry(&error) || attempt > self.max_retries {
                return Err(error);
            }

            let mut delay = self.backoff_delay(attempt);
            if let FetchError::RateLimited { retry_after } = &error {
                delay = delay.max(*retry_after);
            }

            let record = FetchAttempt {
                number: attempt,
                delay_before: delay,
                status: match &error {
                    FetchError::RateLimited { .. } => Some(429),
                    FetchError::Server { status } | FetchError::Client { status } => Some(*status),
                    FetchError::Network(_) | FetchError::Parse(_) => None,
                },
                error: error.to_string(),
            };
            log::debug!(target: LOG_TARGET, "Retrying after failed attempt: {record:?}");

            tokio::time::sleep(delay).await;
        }
    }

    /// Whether this failure is worth another attempt under this policy.
    fn should_retry(&self, error: &FetchError) -> bool {
        match error {
            FetchError::Network(_) | FetchError::RateLimited { .. } => true,
            FetchError::Server { status } => RETRYABLE_STATUS.contains(status),
            FetchError::Client { .. } | FetchError::Parse(_) => false,
        }
    }

    /// Delay before retry `n` (n >= 1): `base_delay * multiplier^(n-1)`,
    /// capped and optionally jittered.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(16).min(16);
        let factor = self.backoff_multiplier.powi(exponent);
        let mut delay = self.base_delay.mul_f64(factor.max(1.0)).min(MAX_BACKOFF_DELAY);
        if self.jitter {
            delay = delay.mul_f64(1.0 + jitter_fraction());
        }
        delay
    }
}

/// Classify a non-success status into the fetch error taxonomy.
fn classify_status(status: u16, headers: &HeaderMap, rate: &RateTracker) -> FetchError {
    if status == 429 {
        let retry_after = rate
            .retry_after()
            .or_else(|| parse_retry_after(headers))
            .unwrap_or(DEFAULT_RATE_LIMIT_DELAY);
        FetchError::RateLimited { retry_after }
    } else if (500..600).contains(&status) {
        FetchError::Server { status }
    } else {
        FetchError::Client { status }
    }
}

/// Parse the `Retry-After` header value as a number of seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|h| h.to_str().ok())?
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(secs))
}

/// Pseudo-random fraction in `[0, 0.25)` derived from the clock's subsecond
/// nanos; enough spread to de-synchronize concurrent retries.
fn jitter_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 4000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use reqwest::header::HeaderValue;

    fn policy(max_retries: u32, base_delay: Duration) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay,
            backoff_multiplier: 2.0,
            jitter: false,
            attempt_timeout: Duration::from_millis(20),
        }
    }

    #[test]
    fn backoff_delay_grows_exponentially() {
        let p = policy(3, Duration::from_millis(100));
        assert_eq!(p.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(p.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(p.backoff_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_delay_is_capped() {
        let p = policy(3, Duration::from_secs(30));
        assert_eq!(p.backoff_delay(10), MAX_BACKOFF_DELAY);
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let p = RetryPolicy {
            jitter: true,
            ..policy(3, Duration::from_millis(100))
        };
        let delay = p.backoff_delay(1);
        assert!(delay >= Duration::from_millis(100));
        assert!(delay < Duration::from_millis(125));
    }

    #[test]
    fn should_retry_honors_the_status_set() {
        let p = policy(3, Duration::from_millis(1));
        assert!(p.should_retry(&FetchError::Server { status: 503 }));
        assert!(p.should_retry(&FetchError::Server { status: 502 }));
        assert!(!p.should_retry(&FetchError::Server { status: 501 }));
        assert!(!p.should_retry(&FetchError::Client { status: 404 }));
        assert!(!p.should_retry(&FetchError::Parse("bad".into())));
        assert!(p.should_retry(&FetchError::Network("reset".into())));
    }

    #[test]
    fn classify_429_prefers_tracker_wait() {
        let rate = RateTracker::new();
        let mut h = HeaderMap::new();
        let _ = h.insert("x-ratelimit-limit", HeaderValue::from_static("60"));
        let _ = h.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        let reset = (chrono::Utc::now().timestamp() + 100).to_string();
        let _ = h.insert("x-ratelimit-reset", HeaderValue::from_str(&reset).unwrap());
        rate.record_response(&h);

        match classify_status(429, &HeaderMap::new(), &rate) {
            FetchError::RateLimited { retry_after } => assert!(retry_after > Duration::from_secs(90)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn classify_429_falls_back_to_retry_after_header() {
        let rate = RateTracker::new();
        let mut h = HeaderMap::new();
        let _ = h.insert(reqwest::header::RETRY_AFTER, HeaderValue::from_static("7"));

        match classify_status(429, &h, &rate) {
            FetchError::RateLimited { retry_after } => assert_eq!(retry_after, Duration::from_secs(7)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn classify_429_without_any_signal_uses_default() {
        let rate = RateTracker::new();
        match classify_status(429, &HeaderMap::new(), &rate) {
            FetchError::RateLimited { retry_after } => assert_eq!(retry_after, DEFAULT_RATE_LIMIT_DELAY),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn classify_splits_server_and_client() {
        let rate = RateTracker::new();
        assert_eq!(
            classify_status(500, &HeaderMap::new(), &rate),
            FetchError::Server { status: 500 }
        );
        assert_eq!(
            classify_status(404, &HeaderMap::new(), &rate),
            FetchError::Client { status: 404 }
        );
    }

    #[tokio::test]
    async fn timeouts_are_retried_up_to_the_bound() {
        let p = policy(2, Duration::from_millis(1));
        let rate = RateTracker::new();
        let attempts = AtomicU32::new(0);

        let result = p
            .execute(&rate, || {
                let _ = attempts.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<Result<reqwest::Response, reqwest::Error>>()
            })
            .await;

        // max_retries = 2 means 3 attempts total.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(FetchError::Network(_))));
    }
}
