//! One fetcher per resource kind, sharing a common pipeline.
//!
//! Every fetch flows through [`Fetcher::cached_fetch`]: consult the TTL
//! cache, coalesce onto any identical in-flight fetch, then load over the
//! network under the retry policy. Loads run as detached tasks so they
//! settle and populate the cache even if every interested caller has gone
//! away. Terminal failures are never cached; the next call retries.

use super::api::ApiClient;
use super::cache::TtlCache;
use super::error::FetchError;
use super::rate::{Gate, RateLimitState, RateTracker};
use super::resource::{
    CacheKey, CachedValue, EventInfo, LanguageBytes, RateLimitBody, Repository, ResourceKind, TrafficClonesBody,
    TrafficCounts, TrafficSummary, TrafficViewsBody, UserProfile,
};
use super::retry::RetryPolicy;
use crate::config::StatsConfig;
use chrono::DateTime;
use compact_str::CompactString;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const LOG_TARGET: &str = "   fetcher";

/// A shared in-flight fetch; later callers for the same key attach to it
/// instead of issuing a duplicate upstream request.
type PendingFetch = Shared<BoxFuture<'static, Result<CachedValue, FetchError>>>;

struct Inner {
    api: ApiClient,
    cache: TtlCache,
    rate: RateTracker,
    retry: RetryPolicy,
    config: StatsConfig,
    pending: Mutex<HashMap<CacheKey, PendingFetch>>,
}

/// Cache-aware, rate-limit-aware resource fetchers. Cheap to clone.
#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fetcher")
            .field("base_url", &self.inner.api.base_url())
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    pub fn new(config: StatsConfig) -> crate::Result<Self> {
        let api = ApiClient::new(config.base_url.clone(), config.token.as_deref())?;
        let retry = RetryPolicy::from_config(&config);
        Ok(Self {
            inner: Arc::new(Inner {
                api,
                cache: TtlCache::new(),
                rate: RateTracker::new(),
                retry,
                config,
                pending: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub(crate) fn cache(&self) -> &TtlCache {
        &self.inner.cache
    }

    pub(crate) fn rate(&self) -> &RateTracker {
        &self.inner.rate
    }

    /// Fetch the user profile.
    pub async fn user_profile(&self, login: &str) -> Result<Arc<UserProfile>, FetchError> {
        let key = CacheKey::new(ResourceKind::Profile, Some(login));
        let inner = Arc::clone(&self.inner);
        let login = CompactString::from(login);
        let value = self
            .cached_fetch(key, move || async move { inner.load_profile(&login).await }.boxed())
            .await?;
        match value {
            CachedValue::Profile(profile) => Ok(profile),
            _ => unreachable!("profile key always holds a profile value"),
        }
    }

    /// Fetch the repository list, following pagination up to the page cap.
    pub async fn repositories(&self, login: &str) -> Result<Arc<Vec<Repository>>, FetchError> {
        let key = CacheKey::new(ResourceKind::Repositories, Some(login));
        let inner = Arc::clone(&self.inner);
        let login = CompactString::from(login);
        let value = self
            .cached_fetch(key, move || async move { inner.load_repositories(&login).await }.boxed())
            .await?;
        match value {
            CachedValue::Repositories(repos) => Ok(repos),
            _ => unreachable!("repositories key always holds a repository list"),
        }
    }

    /// Fetch the user's recent public events.
    pub async fn recent_events(&self, login: &str) -> Result<Arc<Vec<EventInfo>>, FetchError> {
        let key = CacheKey::new(ResourceKind::Events, Some(login));
        let inner = Arc::clone(&self.inner);
        let login = CompactString::from(login);
        let value = self
            .cached_fetch(key, move || async move { inner.load_events(&login).await }.boxed())
            .await?;
        match value {
            CachedValue::Events(events) => Ok(events),
            _ => unreachable!("events key always holds an event list"),
        }
    }

    /// Fetch one repository's language byte counts.
    pub async fn languages(&self, owner: &str, repo: &str) -> Result<Arc<LanguageBytes>, FetchError> {
        let key = CacheKey::new(ResourceKind::Languages, Some(format!("{owner}/{repo}").as_str()));
        let inner = Arc::clone(&self.inner);
        let (owner, repo) = (CompactString::from(owner), CompactString::from(repo));
        let value = self
            .cached_fetch(key, move || {
                async move { inner.load_languages(&owner, &repo).await }.boxed()
            })
            .await?;
        match value {
            CachedValue::Languages(languages) => Ok(languages),
            _ => unreachable!("languages key always holds a language map"),
        }
    }

    /// Fetch one repository's traffic summary (views, clones, referrers,
    /// popular paths). Requires elevated authorization; without it the
    /// remote answers 403, which surfaces as a terminal `Client` error.
    pub async fn traffic(&self, owner: &str, repo: &str) -> Result<Arc<TrafficSummary>, FetchError> {
        let key = CacheKey::new(ResourceKind::Traffic, Some(format!("{owner}/{repo}").as_str()));
        let inner = Arc::clone(&self.inner);
        let (owner, repo) = (CompactString::from(owner), CompactString::from(repo));
        let value = self
            .cached_fetch(key, move || async move { inner.load_traffic(&owner, &repo).await }.boxed())
            .await?;
        match value {
            CachedValue::Traffic(traffic) => Ok(traffic),
            _ => unreachable!("traffic key always holds a traffic summary"),
        }
    }

    /// Query `GET /rate_limit` and seed the tracker from it. Not cached,
    /// since the endpoint does not count against the quota.
    pub async fn sync_rate_limit(&self) -> Result<RateLimitState, FetchError> {
        self.inner.load_rate_limit().await
    }

    /// The shared fetch pipeline: cache, then single-flight, then network.
    ///
    /// The first caller for a key installs a shared pending fetch; later
    /// callers attach to it. The registry entry is removed once the fetch
    /// settles, success or terminal failure.
    async fn cached_fetch<F>(&self, key: CacheKey, loader: F) -> Result<CachedValue, FetchError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<CachedValue, FetchError>>,
    {
        if let Some(value) = self.inner.cache.get(&key) {
            return Ok(value);
        }

        let fetch = {
            let mut pending = self.inner.pending.lock().expect("pending lock not poisoned");
            if let Some(existing) = pending.get(&key) {
                log::debug!(target: LOG_TARGET, "Coalescing onto in-flight fetch for {key}");
                existing.clone()
            } else if let Some(value) = self.inner.cache.get(&key) {
                // A fetch settled between the first cache check and here.
                return Ok(value);
            } else {
                log::info!(target: LOG_TARGET, "Fetching {key}");
                let inner = Arc::clone(&self.inner);
                let task_key = key.clone();
                let fut = loader();
                // Detached task: the fetch runs to completion and populates
                // the cache even if every waiting caller is dropped.
                let task = tokio::spawn(async move {
                    let result = fut.await;
                    match &result {
                        Ok(value) => {
                            let ttl = inner.config.ttl_for(task_key.kind);
                            inner.cache.set(task_key.clone(), value.clone(), ttl);
                        }
                        Err(e) => {
                            log::warn!(target: LOG_TARGET, "Could not fetch {task_key}: {e}");
                        }
                    }
                    let mut pending = inner.pending.lock().expect("pending lock not poisoned");
                    let _ = pending.remove(&task_key);
                    result
                });
                let shared: PendingFetch = async move {
                    task.await
                        .unwrap_or_else(|e| Err(FetchError::Network(format!("fetch task failed: {e}"))))
                }
                .boxed()
                .shared();
                let _ = pending.insert(key.clone(), shared.clone());
                shared
            }
        };

        fetch.await
    }
}

impl Inner {
    /// Rate gate, then a retried GET. When the tracked quota is exhausted no
    /// request is issued at all; callers get `RateLimited` with the wait.
    async fn get_response(&self, path: &str) -> Result<reqwest::Response, FetchError> {
        if let Gate::Wait(retry_after) = self.rate.can_proceed() {
            log::debug!(
                target: LOG_TARGET,
                "Quota exhausted, holding back GET {path} for {}s",
                retry_after.as_secs()
            );
            return Err(FetchError::RateLimited { retry_after });
        }

        let url = self.api.url(path);
        self.retry.execute(&self.rate, || self.api.get(&url)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let resp = self.get_response(path).await?;
        ApiClient::parse_body(resp).await
    }

    async fn load_profile(&self, login: &str) -> Result<CachedValue, FetchError> {
        let profile: UserProfile = self.get_json(&format!("/users/{login}")).await?;
        Ok(CachedValue::Profile(Arc::new(profile)))
    }

    async fn load_repositories(&self, login: &str) -> Result<CachedValue, FetchError> {
        let page_size = self.config.page_size;
        let mut all = Vec::new();
        let mut page = 1u32;

        loop {
            let path = format!("/users/{login}/repos?per_page={page_size}&page={page}&sort=pushed");
            let resp = self.get_response(&path).await?;

            let has_next_page = resp
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|h| h.to_str().ok())
                .is_some_and(|link| link.contains(r#"rel="next""#));

            let repos: Vec<Repository> = ApiClient::parse_body(resp).await?;
            let short_page = repos.len() < usize::from(page_size);
            all.extend(repos);

            if short_page || !has_next_page {
                break;
            }

            page += 1;
            if page > self.config.max_pages {
                log::debug!(
                    target: LOG_TARGET,
                    "Reached repository page cap ({}) for '{login}', stopping after {} repositories",
                    self.config.max_pages,
                    all.len()
                );
                break;
            }
        }

        Ok(CachedValue::Repositories(Arc::new(all)))
    }

    async fn load_events(&self, login: &str) -> Result<CachedValue, FetchError> {
        let path = format!("/users/{login}/events?per_page={}", self.config.page_size);
        let events: Vec<EventInfo> = self.get_json(&path).await?;
        Ok(CachedValue::Events(Arc::new(events)))
    }

    async fn load_languages(&self, owner: &str, repo: &str) -> Result<CachedValue, FetchError> {
        let languages: LanguageBytes = self.get_json(&format!("/repos/{owner}/{repo}/languages")).await?;
        Ok(CachedValue::Languages(Arc::new(languages)))
    }

    /// The four traffic endpoints, fetched sequentially so one cache miss
    /// produces at most one in-flight request at a time against the quota.
    async fn load_traffic(&self, owner: &str, repo: &str) -> Result<CachedValue, FetchError> {
        let base = format!("/repos/{owner}/{repo}/traffic");

        let views: TrafficViewsBody = self.get_json(&format!("{base}/views")).await?;
        let clones: TrafficClonesBody = self.get_json(&format!("{base}/clones")).await?;
        let referrers = self.get_json(&format!("{base}/popular/referrers")).await?;
        let paths = self.get_json(&format!("{base}/popular/paths")).await?;

        Ok(CachedValue::Traffic(Arc::new(TrafficSummary {
            views: TrafficCounts {
                count: views.count,
                uniques: views.uniques,
                daily: views.views,
            },
            clones: TrafficCounts {
                count: clones.count,
                uniques: clones.uniques,
                daily: clones.clones,
            },
            referrers,
            paths,
        })))
    }

    /// `GET /rate_limit` bypasses the gate: it is free and is exactly what
    /// we need when the tracked window says we are out of quota.
    async fn load_rate_limit(&self) -> Result<RateLimitState, FetchError> {
        let url = self.api.url("/rate_limit");
        let resp = self.retry.execute(&self.rate, || self.api.get(&url)).await?;
        let body: RateLimitBody = ApiClient::parse_body(resp).await?;

        let reset_at = DateTime::from_timestamp(body.rate.reset, 0)
            .ok_or_else(|| FetchError::Parse("rate limit reset timestamp out of range".to_string()))?;
        let state = RateLimitState {
            limit: body.rate.limit,
            remaining: body.rate.remaining,
            reset_at,
        };
        self.rate.record_state(state);
        Ok(state)
    }
}
