//! The fetch error taxonomy.
//!
//! Everything that can go wrong talking to the API is folded into
//! [`FetchError`] at the fetcher boundary. The enum is `Clone` so that a
//! failure from a shared in-flight fetch can be handed to every coalesced
//! caller.

use core::fmt::{Display, Formatter};
use core::time::Duration;

/// A typed fetch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, DNS, or connection failure. Retryable.
    Network(String),

    /// 429 or quota exhaustion. Retryable once `retry_after` has elapsed.
    RateLimited {
        /// Time to wait before the quota window resets.
        retry_after: Duration,
    },

    /// 5xx from the remote service. Retryable.
    Server { status: u16 },

    /// 4xx other than 429. Terminal; retrying cannot fix a client error.
    Client { status: u16 },

    /// Malformed response body. Terminal.
    Parse(String),
}

impl FetchError {
    /// Whether re-attempting the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. } | Self::Server { .. })
    }

    /// Classify a transport-level `reqwest` failure.
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("request timed out".to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::RateLimited { retry_after } => {
                write!(f, "rate limited, retry in {}s", retry_after.as_secs())
            }
            Self::Server { status } => write!(f, "server error (HTTP {status})"),
            Self::Client { status } => write!(f, "client error (HTTP {status})"),
            Self::Parse(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(FetchError::Network("boom".into()).is_retryable());
        assert!(FetchError::RateLimited { retry_after: Duration::from_secs(1) }.is_retryable());
        assert!(FetchError::Server { status: 503 }.is_retryable());
        assert!(!FetchError::Client { status: 404 }.is_retryable());
        assert!(!FetchError::Parse("bad json".into()).is_retryable());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            FetchError::Server { status: 502 }.to_string(),
            "server error (HTTP 502)"
        );
        assert_eq!(
            FetchError::Client { status: 403 }.to_string(),
            "client error (HTTP 403)"
        );
        assert_eq!(
            FetchError::RateLimited { retry_after: Duration::from_secs(90) }.to_string(),
            "rate limited, retry in 90s"
        );
    }

    #[test]
    fn clones_compare_equal() {
        let err = FetchError::Client { status: 422 };
        assert_eq!(err.clone(), err);
    }
}
