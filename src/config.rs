//! Static configuration for the statistics client.

use crate::stats::resource::ResourceKind;
use core::time::Duration;

/// Default maximum retry attempts (on top of the original request).
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff between retries.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default timeout applied independently to each request attempt.
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on simultaneously in-flight per-repository fetches.
const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Fixed page size used for paginated endpoints.
const DEFAULT_PAGE_SIZE: u8 = 100;

/// Pages beyond this cap are not fetched (bounded resource use over completeness).
const DEFAULT_MAX_PAGES: u32 = 10;

/// Configuration for a [`StatsClient`](crate::stats::StatsClient).
///
/// [`StatsConfig::default`] gives the production defaults; tests override the
/// base URL and shrink the delays.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Bearer token. Traffic endpoints require a token with push access;
    /// without one they fail with a 403 that is recorded, not fatal.
    pub token: Option<String>,

    /// Base API URL, without a trailing slash.
    pub base_url: String,

    /// Cache TTL for the user profile.
    pub profile_ttl: Duration,

    /// Cache TTL for the repository list.
    pub repos_ttl: Duration,

    /// Cache TTL for the recent-events feed.
    pub events_ttl: Duration,

    /// Cache TTL for per-repository language breakdowns.
    pub languages_ttl: Duration,

    /// Cache TTL for per-repository traffic. Shorter than the others because
    /// traffic access commonly requires elevated authorization and is more
    /// failure-prone.
    pub traffic_ttl: Duration,

    /// Maximum retry attempts per request, on top of the original attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff.
    pub base_delay: Duration,

    /// Backoff multiplier applied per retry.
    pub backoff_multiplier: f64,

    /// Whether to add random jitter to backoff delays.
    pub jitter: bool,

    /// Timeout applied independently to each attempt.
    pub attempt_timeout: Duration,

    /// Maximum simultaneously in-flight per-repository fetches.
    pub max_concurrency: usize,

    /// Page size for paginated endpoints.
    pub page_size: u8,

    /// Maximum number of pages fetched from paginated endpoints.
    pub max_pages: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: "https://api.github.com".to_string(),
            profile_ttl: ResourceKind::Profile.default_ttl(),
            repos_ttl: ResourceKind::Repositories.default_ttl(),
            events_ttl: ResourceKind::Events.default_ttl(),
            languages_ttl: ResourceKind::Languages.default_ttl(),
            traffic_ttl: ResourceKind::Traffic.default_ttl(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            backoff_multiplier: 2.0,
            jitter: false,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl StatsConfig {
    /// The configured cache TTL for a resource kind.
    #[must_use]
    pub const fn ttl_for(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Profile => self.profile_ttl,
            ResourceKind::Repositories => self.repos_ttl,
            ResourceKind::Events => self.events_ttl,
            ResourceKind::Languages => self.languages_ttl,
            ResourceKind::Traffic => self.traffic_ttl,
        }
    }
}
