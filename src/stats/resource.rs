//! Resource kinds, their static descriptors, and the typed records parsed at
//! the fetcher boundary.
//!
//! The GitHub API is duck-typed JSON; everything crossing into this crate is
//! deserialized into one of the record types below, and a shape mismatch is a
//! [`FetchError::Parse`](super::FetchError) rather than untyped data leaking
//! upward.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use core::fmt::{Display, Formatter};
use core::time::Duration;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The kinds of remote resource this crate fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Profile,
    Repositories,
    Events,
    Languages,
    Traffic,
}

/// Static configuration for a resource kind: endpoint template, default
/// cache TTL, and whether the endpoint requires elevated authorization.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    /// Endpoint template relative to the base URL. `{login}`, `{owner}` and
    /// `{repo}` are substituted by the fetchers.
    pub endpoint: &'static str,
    pub default_ttl: Duration,
    /// Traffic endpoints require push access to the repository; the others
    /// work unauthenticated (at a lower rate quota).
    pub elevated_auth: bool,
}

static DESCRIPTORS: &[ResourceDescriptor] = &[
    ResourceDescriptor {
        kind: ResourceKind::Profile,
        endpoint: "/users/{login}",
        default_ttl: Duration::from_secs(15 * 60),
        elevated_auth: false,
    },
    ResourceDescriptor {
        kind: ResourceKind::Repositories,
        endpoint: "/users/{login}/repos",
        default_ttl: Duration::from_secs(30 * 60),
        elevated_auth: false,
    },
    ResourceDescriptor {
        kind: ResourceKind::Events,
        endpoint: "/users/{login}/events",
        default_ttl: Duration::from_secs(5 * 60),
        elevated_auth: false,
    },
    ResourceDescriptor {
        kind: ResourceKind::Languages,
        endpoint: "/repos/{owner}/{repo}/languages",
        default_ttl: Duration::from_secs(60 * 60),
        elevated_auth: false,
    },
    ResourceDescriptor {
        kind: ResourceKind::Traffic,
        endpoint: "/repos/{owner}/{repo}/traffic",
        default_ttl: Duration::from_secs(10 * 60),
        elevated_auth: true,
    },
];

impl ResourceKind {
    /// All resource kinds in a consistent order.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [Self::Profile, Self::Repositories, Self::Events, Self::Languages, Self::Traffic]
    }

    /// Display name for logs and failure records.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Repositories => "repositories",
            Self::Events => "events",
            Self::Languages => "languages",
            Self::Traffic => "traffic",
        }
    }

    /// The static descriptor for this kind.
    #[must_use]
    pub fn descriptor(self) -> &'static ResourceDescriptor {
        DESCRIPTORS
            .iter()
            .find(|d| d.kind == self)
            .expect("every resource kind has a descriptor")
    }

    /// Default cache TTL for this kind.
    #[must_use]
    pub fn default_ttl(self) -> Duration {
        self.descriptor().default_ttl
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Composite cache key: resource kind plus optional identifier, so that
/// different repositories' language and traffic entries do not collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub kind: ResourceKind,
    pub id: Option<CompactString>,
}

impl CacheKey {
    #[must_use]
    pub fn new(kind: ResourceKind, id: Option<&str>) -> Self {
        Self {
            kind,
            id: id.map(CompactString::from),
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{id}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// A user profile, from `GET /users/{login}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub login: CompactString,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    pub created_at: Option<DateTime<Utc>>,
}

/// One repository, from `GET /users/{login}/repos`.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: CompactString,
    pub full_name: CompactString,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<CompactString>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub fork: bool,
    pub pushed_at: Option<DateTime<Utc>>,
}

impl Repository {
    /// The owner half of `full_name`, or the empty string if malformed.
    #[must_use]
    pub fn owner(&self) -> &str {
        self.full_name.split_once('/').map_or("", |(owner, _)| owner)
    }
}

/// Bytes of code per language, from `GET /repos/{owner}/{repo}/languages`.
///
/// `BTreeMap` so that iteration (and rendering) order is deterministic.
pub type LanguageBytes = BTreeMap<String, u64>;

/// A single day's traffic counts.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficPoint {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub uniques: u64,
}

/// Aggregate view or clone counts over the reporting window.
#[derive(Debug, Clone, Default)]
pub struct TrafficCounts {
    pub count: u64,
    pub uniques: u64,
    pub daily: Vec<TrafficPoint>,
}

/// Wire shape of `GET /repos/{owner}/{repo}/traffic/views`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficViewsBody {
    pub count: u64,
    pub uniques: u64,
    #[serde(default)]
    pub views: Vec<TrafficPoint>,
}

/// Wire shape of `GET /repos/{owner}/{repo}/traffic/clones`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficClonesBody {
    pub count: u64,
    pub uniques: u64,
    #[serde(default)]
    pub clones: Vec<TrafficPoint>,
}

/// A top referrer, from `GET /repos/{owner}/{repo}/traffic/popular/referrers`.
#[derive(Debug, Clone, Deserialize)]
pub struct Referrer {
    pub referrer: String,
    pub count: u64,
    pub uniques: u64,
}

/// A popular content path, from `GET /repos/{owner}/{repo}/traffic/popular/paths`.
#[derive(Debug, Clone, Deserialize)]
pub struct PopularPath {
    pub path: String,
    #[serde(default)]
    pub title: String,
    pub count: u64,
    pub uniques: u64,
}

/// Composite traffic data for one repository, merged from the four traffic
/// endpoints.
#[derive(Debug, Clone, Default)]
pub struct TrafficSummary {
    pub views: TrafficCounts,
    pub clones: TrafficCounts,
    pub referrers: Vec<Referrer>,
    pub paths: Vec<PopularPath>,
}

/// One public event, from `GET /users/{login}/events`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventInfo {
    pub id: CompactString,
    #[serde(rename = "type")]
    pub kind: CompactString,
    pub repo: EventRepo,
    pub created_at: Option<DateTime<Utc>>,
}

/// The repository an event occurred in.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRepo {
    pub name: CompactString,
}

/// One quota window from `GET /rate_limit`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateWindowBody {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the window resets.
    pub reset: i64,
}

/// Wire shape of `GET /rate_limit`. Only the core window matters here.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitBody {
    pub rate: RateWindowBody,
}

/// A cached value: one variant per resource kind, each behind an `Arc` so
/// entries clone cheaply and are immutable once stored.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Profile(Arc<UserProfile>),
    Repositories(Arc<Vec<Repository>>),
    Events(Arc<Vec<EventInfo>>),
    Languages(Arc<LanguageBytes>),
    Traffic(Arc<TrafficSummary>),
}

impl CachedValue {
    /// The resource kind this value belongs to.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Profile(_) => ResourceKind::Profile,
            Self::Repositories(_) => ResourceKind::Repositories,
            Self::Events(_) => ResourceKind::Events,
            Self::Languages(_) => ResourceKind::Languages,
            Self::Traffic(_) => ResourceKind::Traffic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_descriptor() {
        for kind in ResourceKind::all() {
            let descriptor = kind.descriptor();
            assert_eq!(descriptor.kind, kind);
            assert!(descriptor.endpoint.starts_with('/'));
            assert!(descriptor.default_ttl > Duration::ZERO);
        }
    }

    #[test]
    fn only_traffic_needs_elevated_auth() {
        for kind in ResourceKind::all() {
            assert_eq!(kind.descriptor().elevated_auth, kind == ResourceKind::Traffic);
        }
    }

    #[test]
    fn traffic_ttl_is_shortest_of_repo_scoped_kinds() {
        assert!(ResourceKind::Traffic.default_ttl() < ResourceKind::Languages.default_ttl());
        assert!(ResourceKind::Traffic.default_ttl() < ResourceKind::Repositories.default_ttl());
    }

    #[test]
    fn cache_key_display() {
        let bare = CacheKey::new(ResourceKind::Profile, None);
        assert_eq!(bare.to_string(), "profile");

        let scoped = CacheKey::new(ResourceKind::Languages, Some("octocat/hello-world"));
        assert_eq!(scoped.to_string(), "languages:octocat/hello-world");
    }

    #[test]
    fn cache_keys_for_different_repos_do_not_collide() {
        let a = CacheKey::new(ResourceKind::Traffic, Some("octocat/alpha"));
        let b = CacheKey::new(ResourceKind::Traffic, Some("octocat/beta"));
        assert_ne!(a, b);
    }

    #[test]
    fn repository_owner_from_full_name() {
        let json = r#"{"name": "hello-world", "full_name": "octocat/hello-world"}"#;
        let repo: Repository = serde_json::from_str(json).unwrap();
        assert_eq!(repo.owner(), "octocat");
        assert_eq!(repo.stargazers_count, 0);
        assert!(!repo.fork);
    }

    #[test]
    fn repository_deserialize_full() {
        let json = r#"{
            "name": "tokio",
            "full_name": "tokio-rs/tokio",
            "description": "A runtime",
            "language": "Rust",
            "stargazers_count": 25000,
            "forks_count": 2300,
            "open_issues_count": 200,
            "fork": false,
            "pushed_at": "2024-06-01T12:00:00Z"
        }"#;
        let repo: Repository = serde_json::from_str(json).unwrap();
        assert_eq!(repo.owner(), "tokio-rs");
        assert_eq!(repo.stargazers_count, 25_000);
        assert_eq!(repo.language.as_deref(), Some("Rust"));
        assert!(repo.pushed_at.is_some());
    }

    #[test]
    fn profile_deserialize_sparse() {
        let json = r#"{"login": "octocat"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.login, "octocat");
        assert_eq!(profile.public_repos, 0);
        assert!(profile.created_at.is_none());
    }

    #[test]
    fn traffic_views_body_deserialize() {
        let json = r#"{
            "count": 14850,
            "uniques": 3782,
            "views": [{"timestamp": "2024-06-01T00:00:00Z", "count": 100, "uniques": 50}]
        }"#;
        let body: TrafficViewsBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.count, 14_850);
        assert_eq!(body.views.len(), 1);
        assert_eq!(body.views[0].uniques, 50);
    }

    #[test]
    fn event_deserialize() {
        let json = r#"{
            "id": "1234567890",
            "type": "PushEvent",
            "repo": {"name": "octocat/hello-world"},
            "created_at": "2024-06-01T12:00:00Z"
        }"#;
        let event: EventInfo = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, "PushEvent");
        assert_eq!(event.repo.name, "octocat/hello-world");
    }

    #[test]
    fn rate_limit_body_deserialize() {
        let json = r#"{"rate": {"limit": 5000, "remaining": 4999, "reset": 1704067200, "used": 1}}"#;
        let body: RateLimitBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.rate.limit, 5000);
        assert_eq!(body.rate.reset, 1_704_067_200);
    }

    #[test]
    fn cached_value_reports_its_kind() {
        let value = CachedValue::Languages(Arc::new(LanguageBytes::new()));
        assert_eq!(value.kind(), ResourceKind::Languages);
    }
}
