//! Tracking of the remote service's rate-limit window.
//!
//! The tracker is updated from the `x-ratelimit-*` headers of every response,
//! success or failure, and decides whether the next request may proceed
//! immediately or must wait for the window to reset. Last-writer-wins is
//! acceptable because the remote service is the single source of truth.

use chrono::{DateTime, Utc};
use core::time::Duration;
use reqwest::header::HeaderMap;
use std::sync::Mutex;

const LOG_TARGET: &str = "      rate";

/// The tracked quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Outcome of [`RateTracker::can_proceed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Quota available (or no window tracked yet); the request may go out.
    Allow,
    /// Quota exhausted; wait this long before trying again.
    Wait(Duration),
}

/// Shared tracker for the remote quota window.
#[derive(Debug, Default)]
pub struct RateTracker {
    state: Mutex<Option<RateLimitState>>,
}

impl RateTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a request may be issued right now.
    ///
    /// Denies only when the tracked window has zero remaining quota and has
    /// not yet reset.
    #[must_use]
    pub fn can_proceed(&self) -> Gate {
        let state = self.state.lock().expect("rate lock not poisoned");
        match *state {
            Some(s) if s.remaining == 0 => {
                let now = Utc::now();
                if now < s.reset_at {
                    let wait = (s.reset_at - now).to_std().unwrap_or(Duration::ZERO);
                    Gate::Wait(wait)
                } else {
                    Gate::Allow
                }
            }
            _ => Gate::Allow,
        }
    }

    /// How long until the window resets, if the quota is exhausted.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self.can_proceed() {
            Gate::Allow => None,
            Gate::Wait(d) => Some(d),
        }
    }

    /// Fold the rate-limit headers of a response into the tracked state.
    ///
    /// Responses without a rate-limit signal leave the state unchanged; they
    /// never reset it to a default.
    pub fn record_response(&self, headers: &HeaderMap) {
        if let Some(update) = parse_rate_limit_headers(headers) {
            self.record_state(update);
        }
    }

    /// Overwrite the tracked state, e.g. when seeding from `GET /rate_limit`.
    pub fn record_state(&self, update: RateLimitState) {
        let mut state = self.state.lock().expect("rate lock not poisoned");
        let merged = match *state {
            // reset_at never moves backwards; within a window the remote only
            // pushes it forward, and a new window pushes it further still.
            Some(prev) => RateLimitState {
                limit: update.limit,
                remaining: update.remaining.min(update.limit),
                reset_at: update.reset_at.max(prev.reset_at),
            },
            None => RateLimitState {
                limit: update.limit,
                remaining: update.remaining.min(update.limit),
                reset_at: update.reset_at,
            },
        };
        log::debug!(
            target: LOG_TARGET,
            "Rate window: {}/{} remaining, resets at {}",
            merged.remaining,
            merged.limit,
            merged.reset_at.format("%T")
        );
        *state = Some(merged);
    }

    /// The currently tracked window, if any response has carried one yet.
    #[must_use]
    pub fn state(&self) -> Option<RateLimitState> {
        *self.state.lock().expect("rate lock not poisoned")
    }
}

/// Extract the quota window from `x-ratelimit-*` response headers.
///
/// Requires at least `remaining` and `reset`; a missing `limit` falls back to
/// treating `remaining` as the ceiling.
fn parse_rate_limit_headers(headers: &HeaderMap) -> Option<RateLimitState> {
    let remaining = header_u32(headers, "x-ratelimit-remaining")?;
    let reset_secs = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_secs, 0)?;
    let limit = header_u32(headers, "x-ratelimit-limit").unwrap_or(remaining);

    Some(RateLimitState {
        limit,
        remaining,
        reset_at,
    })
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(limit: &str, remaining: &str, reset: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        let _ = h.insert("x-ratelimit-limit", HeaderValue::from_str(limit).unwrap());
        let _ = h.insert("x-ratelimit-remaining", HeaderValue::from_str(remaining).unwrap());
        let _ = h.insert("x-ratelimit-reset", HeaderValue::from_str(reset).unwrap());
        h
    }

    fn epoch_in(seconds: i64) -> String {
        (Utc::now().timestamp() + seconds).to_string()
    }

    #[test]
    fn untracked_state_allows() {
        let tracker = RateTracker::new();
        assert_eq!(tracker.can_proceed(), Gate::Allow);
        assert!(tracker.retry_after().is_none());
        assert!(tracker.state().is_none());
    }

    #[test]
    fn remaining_quota_allows() {
        let tracker = RateTracker::new();
        tracker.record_response(&headers("5000", "4999", &epoch_in(3600)));
        assert_eq!(tracker.can_proceed(), Gate::Allow);
    }

    #[test]
    fn exhausted_quota_waits_until_reset() {
        let tracker = RateTracker::new();
        tracker.record_response(&headers("5000", "0", &epoch_in(120)));

        match tracker.can_proceed() {
            Gate::Wait(wait) => {
                assert!(wait > Duration::from_secs(110));
                assert!(wait <= Duration::from_secs(120));
            }
            Gate::Allow => panic!("expected Wait"),
        }
        assert!(tracker.retry_after().is_some());
    }

    #[test]
    fn exhausted_quota_with_past_reset_allows() {
        let tracker = RateTracker::new();
        tracker.record_response(&headers("5000", "0", &epoch_in(-10)));
        assert_eq!(tracker.can_proceed(), Gate::Allow);
    }

    #[test]
    fn missing_headers_leave_state_unchanged() {
        let tracker = RateTracker::new();
        tracker.record_response(&headers("5000", "100", &epoch_in(600)));
        let before = tracker.state().unwrap();

        tracker.record_response(&HeaderMap::new());
        assert_eq!(tracker.state().unwrap(), before);
    }

    #[test]
    fn partial_headers_leave_state_unchanged() {
        let tracker = RateTracker::new();
        tracker.record_response(&headers("5000", "100", &epoch_in(600)));
        let before = tracker.state().unwrap();

        let mut partial = HeaderMap::new();
        let _ = partial.insert("x-ratelimit-remaining", HeaderValue::from_static("50"));
        tracker.record_response(&partial);
        assert_eq!(tracker.state().unwrap(), before);
    }

    #[test]
    fn missing_limit_falls_back_to_remaining() {
        let tracker = RateTracker::new();
        let mut h = HeaderMap::new();
        let _ = h.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
        let _ = h.insert("x-ratelimit-reset", HeaderValue::from_str(&epoch_in(60)).unwrap());
        tracker.record_response(&h);

        let state = tracker.state().unwrap();
        assert_eq!(state.limit, 42);
        assert_eq!(state.remaining, 42);
    }

    #[test]
    fn remaining_is_clamped_to_limit() {
        let tracker = RateTracker::new();
        tracker.record_response(&headers("60", "100", &epoch_in(60)));
        let state = tracker.state().unwrap();
        assert_eq!(state.remaining, 60);
        assert_eq!(state.limit, 60);
    }

    #[test]
    fn reset_at_is_monotonically_non_decreasing() {
        let tracker = RateTracker::new();
        tracker.record_response(&headers("5000", "10", &epoch_in(600)));
        let first_reset = tracker.state().unwrap().reset_at;

        // A delayed response from earlier in the window must not pull the
        // reset time backwards.
        tracker.record_response(&headers("5000", "12", &epoch_in(10)));
        let state = tracker.state().unwrap();
        assert_eq!(state.reset_at, first_reset);
        // But remaining is last-writer-wins.
        assert_eq!(state.remaining, 12);
    }

    #[test]
    fn new_window_moves_reset_forward() {
        let tracker = RateTracker::new();
        tracker.record_response(&headers("5000", "0", &epoch_in(10)));
        tracker.record_response(&headers("5000", "4999", &epoch_in(3600)));

        let state = tracker.state().unwrap();
        assert_eq!(state.remaining, 4999);
        assert!(state.reset_at > Utc::now() + chrono::Duration::seconds(3000));
    }

    #[test]
    fn malformed_header_values_are_ignored() {
        let tracker = RateTracker::new();
        tracker.record_response(&headers("5000", "not-a-number", &epoch_in(60)));
        assert!(tracker.state().is_none());
    }
}
