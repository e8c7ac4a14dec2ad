//! Data acquisition for GitHub profile statistics
//!
//! This module keeps locally displayed statistics synchronized with the
//! GitHub REST API under its rate limits. Each resource kind (profile,
//! repository list, per-repository languages and traffic, events) has its own
//! fetcher with its own cache TTL; the aggregator composes them into one
//! [`StatisticsSnapshot`].
//!
//! # Implementation Model
//!
//! A fetch for any resource flows through the same pipeline: consult the
//! in-memory TTL cache, coalesce with any identical in-flight fetch, gate on
//! the tracked rate-limit window, then issue the HTTP request under the retry
//! policy. Successful responses are stored back into the cache and their
//! rate-limit headers folded into the tracker; terminal failures are never
//! cached, so the next call retries.
//!
//! The aggregator fans per-repository fetches out concurrently under a
//! bounded permit pool and tolerates partial failure: a single repository's
//! outage degrades the snapshot (`partial = true`, the failure recorded in
//! `failed_resources`) instead of failing the whole call. Only the gating
//! fetches (profile and repository list) are fatal.
//!
//! [`StatsClient`] is the single entry point the presentation layer calls.

mod aggregator;
mod api;
pub mod cache;
mod error;
mod facade;
mod fetcher;
mod limiter;
pub mod rate;
pub mod resource;
mod retry;
mod snapshot;

pub use error::FetchError;
pub use facade::StatsClient;
pub use rate::RateLimitState;
pub use resource::ResourceKind;
pub use snapshot::{FailedResource, StatisticsSnapshot};
