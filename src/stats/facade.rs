use super::aggregator::Aggregator;
use super::error::FetchError;
use super::fetcher::Fetcher;
use super::rate::RateLimitState;
use super::snapshot::StatisticsSnapshot;
use crate::config::StatsConfig;

const LOG_TARGET: &str = "    client";

/// The one entry point callers hold.
///
/// Cheap to clone; clones share the cache, the rate tracker, and the
/// in-flight fetch registry, so concurrent callers asking for the same
/// account coalesce onto a single upstream round.
#[derive(Debug, Clone)]
pub struct StatsClient {
    fetcher: Fetcher,
    aggregator: Aggregator,
}

impl StatsClient {
    /// Create a client from `config`.
    ///
    /// Fails only on unusable configuration, such as a token that cannot
    /// be encoded into a request header.
    pub fn new(config: StatsConfig) -> crate::Result<Self> {
        let max_concurrency = config.max_concurrency;
        let fetcher = Fetcher::new(config)?;
        let aggregator = Aggregator::new(fetcher.clone(), max_concurrency);

        Ok(Self { fetcher, aggregator })
    }

    /// Get the full statistics snapshot for `login`, serving individual
    /// resources from cache when they are still fresh.
    pub async fn get_statistics(&self, login: &str) -> Result<StatisticsSnapshot, FetchError> {
        log::debug!(target: LOG_TARGET, "Assembling statistics for '{login}'");
        self.aggregator.statistics(login).await
    }

    /// Like [`get_statistics`](Self::get_statistics), but drops all cached
    /// state first so every resource is fetched anew.
    ///
    /// Fetches already in flight are left to finish; the refresh round
    /// issues its own requests and overwrites whatever they store.
    pub async fn refresh(&self, login: &str) -> Result<StatisticsSnapshot, FetchError> {
        log::debug!(target: LOG_TARGET, "Forced refresh for '{login}'");
        self.fetcher.cache().invalidate_all();
        self.aggregator.statistics(login).await
    }

    /// Current rate-limit standing.
    ///
    /// Answers from the tracker when any response has been observed;
    /// otherwise asks the server directly. The dedicated rate-limit
    /// endpoint does not itself consume quota.
    pub async fn rate_limit(&self) -> Result<RateLimitState, FetchError> {
        if let Some(state) = self.fetcher.rate().state() {
            return Ok(state);
        }

        self.fetcher.sync_rate_limit().await
    }

    /// Drop cached data for every account and repository.
    pub fn invalidate_all(&self) {
        self.fetcher.cache().invalidate_all();
    }
}
