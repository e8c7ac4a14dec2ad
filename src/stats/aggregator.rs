//! Composition of many independent fetches into one snapshot.
//!
//! Profile and repository list gate everything else; without a repository
//! list there is nothing to enumerate, so their failure fails the call.
//! Per-repository languages and traffic then fan out concurrently across
//! repositories under the permit pool, and each failure is demoted to a
//! `failed_resources` entry instead of aborting the aggregation.

use super::error::FetchError;
use super::fetcher::Fetcher;
use super::limiter::FetchLimiter;
use super::resource::ResourceKind;
use super::snapshot::{FailedResource, StatisticsSnapshot};
use chrono::Utc;
use compact_str::CompactString;
use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const LOG_TARGET: &str = "aggregator";

/// Builds [`StatisticsSnapshot`]s with bounded concurrency and
/// partial-failure tolerance.
#[derive(Debug, Clone)]
pub struct Aggregator {
    fetcher: Fetcher,
    limiter: Arc<FetchLimiter>,
}

impl Aggregator {
    #[must_use]
    pub fn new(fetcher: Fetcher, max_concurrency: usize) -> Self {
        Self {
            fetcher,
            limiter: FetchLimiter::new(max_concurrency),
        }
    }

    /// Assemble one snapshot for `login`.
    ///
    /// Fails only when a gating fetch (profile or repository list) fails;
    /// every other failure degrades the snapshot to `partial`.
    pub async fn statistics(&self, login: &str) -> Result<StatisticsSnapshot, FetchError> {
        let (user, repositories) = tokio::try_join!(self.fetcher.user_profile(login), self.fetcher.repositories(login))?;

        let per_repo = repositories.iter().map(|repo| {
            let fetcher = self.fetcher.clone();
            let limiter = Arc::clone(&self.limiter);
            let full_name = repo.full_name.clone();
            let owner = CompactString::from(repo.owner());
            let name = repo.name.clone();
            async move {
                let _permit = limiter.acquire().await;
                // Sequential within one repository; concurrency comes from
                // running repositories against each other.
                let languages = fetcher.languages(&owner, &name).await;
                let traffic = fetcher.traffic(&owner, &name).await;
                (full_name, languages, traffic)
            }
        });
        let events = self.fetcher.recent_events(login);

        let (repo_results, events_result) = tokio::join!(join_all(per_repo), events);

        let mut languages = BTreeMap::new();
        let mut traffic = BTreeMap::new();
        let mut failed_resources = BTreeSet::new();

        for (full_name, languages_result, traffic_result) in repo_results {
            match languages_result {
                Ok(data) => {
                    let _ = languages.insert(full_name.clone(), data);
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not fetch languages for '{full_name}': {e}");
                    let _ = failed_resources.insert(FailedResource::new(ResourceKind::Languages, Some(&full_name)));
                }
            }
            match traffic_result {
                Ok(data) => {
                    let _ = traffic.insert(full_name.clone(), data);
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not fetch traffic for '{full_name}': {e}");
                    let _ = failed_resources.insert(FailedResource::new(ResourceKind::Traffic, Some(&full_name)));
                }
            }
        }

        let recent_events = match events_result {
            Ok(events) => events,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch events for '{login}': {e}");
                let _ = failed_resources.insert(FailedResource::new(ResourceKind::Events, None));
                Arc::new(Vec::new())
            }
        };

        let total_stars = repositories.iter().map(|r| r.stargazers_count).sum();
        let total_forks = repositories.iter().map(|r| r.forks_count).sum();
        let partial = !failed_resources.is_empty();

        Ok(StatisticsSnapshot {
            user,
            repositories,
            total_stars,
            total_forks,
            languages,
            traffic,
            recent_events,
            fetched_at: Utc::now(),
            partial,
            failed_resources,
        })
    }
}
