//! The aggregate statistics snapshot returned to the presentation layer.

use super::resource::{EventInfo, LanguageBytes, Repository, ResourceKind, TrafficSummary, UserProfile};
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use core::fmt::{Display, Formatter};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A resource that failed during aggregation: its kind, and the repository
/// it was scoped to, if any.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FailedResource {
    pub kind: ResourceKind,
    pub id: Option<CompactString>,
}

impl FailedResource {
    #[must_use]
    pub fn new(kind: ResourceKind, id: Option<&str>) -> Self {
        Self {
            kind,
            id: id.map(CompactString::from),
        }
    }
}

impl Display for FailedResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} for {id}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// One composite statistics snapshot.
///
/// Constructed fresh on every facade call and never mutated afterwards.
/// Repository order is the order the repository-list endpoint returned.
/// When some non-gating resource failed, the snapshot is `partial` and the
/// failures are listed in `failed_resources`; everything that did succeed is
/// still populated.
#[derive(Debug, Clone)]
pub struct StatisticsSnapshot {
    pub user: Arc<UserProfile>,
    pub repositories: Arc<Vec<Repository>>,
    pub total_stars: u64,
    pub total_forks: u64,
    /// Language breakdown per repository full name.
    pub languages: BTreeMap<CompactString, Arc<LanguageBytes>>,
    /// Traffic summary per repository full name.
    pub traffic: BTreeMap<CompactString, Arc<TrafficSummary>>,
    pub recent_events: Arc<Vec<EventInfo>>,
    pub fetched_at: DateTime<Utc>,
    pub partial: bool,
    pub failed_resources: BTreeSet<FailedResource>,
}

impl StatisticsSnapshot {
    /// Total bytes per language across all repositories with language data,
    /// highest first.
    #[must_use]
    pub fn language_totals(&self) -> Vec<(String, u64)> {
        let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
        for languages in self.languages.values() {
            for (language, bytes) in languages.iter() {
                *totals.entry(language.as_str()).or_default() += bytes;
            }
        }
        let mut out: Vec<(String, u64)> = totals.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Total views and unique visitors across all repositories with traffic
    /// data.
    #[must_use]
    pub fn traffic_totals(&self) -> (u64, u64) {
        self.traffic
            .values()
            .fold((0, 0), |(count, uniques), t| (count + t.views.count, uniques + t.views.uniques))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_snapshot() -> StatisticsSnapshot {
        let profile: UserProfile = serde_json::from_str(r#"{"login": "octocat"}"#).unwrap();
        StatisticsSnapshot {
            user: Arc::new(profile),
            repositories: Arc::new(Vec::new()),
            total_stars: 0,
            total_forks: 0,
            languages: BTreeMap::new(),
            traffic: BTreeMap::new(),
            recent_events: Arc::new(Vec::new()),
            fetched_at: Utc::now(),
            partial: false,
            failed_resources: BTreeSet::new(),
        }
    }

    #[test]
    fn language_totals_sums_across_repositories() {
        let mut snapshot = empty_snapshot();
        let a: LanguageBytes = [("Rust".to_string(), 100), ("TypeScript".to_string(), 50)].into_iter().collect();
        let b: LanguageBytes = [("Rust".to_string(), 200)].into_iter().collect();
        let _ = snapshot.languages.insert("o/a".into(), Arc::new(a));
        let _ = snapshot.languages.insert("o/b".into(), Arc::new(b));

        let totals = snapshot.language_totals();
        assert_eq!(totals[0], ("Rust".to_string(), 300));
        assert_eq!(totals[1], ("TypeScript".to_string(), 50));
    }

    #[test]
    fn language_totals_ties_break_alphabetically() {
        let mut snapshot = empty_snapshot();
        let a: LanguageBytes = [("Zig".to_string(), 10), ("Ada".to_string(), 10)].into_iter().collect();
        let _ = snapshot.languages.insert("o/a".into(), Arc::new(a));

        let totals = snapshot.language_totals();
        assert_eq!(totals[0].0, "Ada");
        assert_eq!(totals[1].0, "Zig");
    }

    #[test]
    fn traffic_totals_sums_views() {
        let mut snapshot = empty_snapshot();
        let mut t1 = TrafficSummary::default();
        t1.views.count = 10;
        t1.views.uniques = 4;
        let mut t2 = TrafficSummary::default();
        t2.views.count = 5;
        t2.views.uniques = 2;
        let _ = snapshot.traffic.insert("o/a".into(), Arc::new(t1));
        let _ = snapshot.traffic.insert("o/b".into(), Arc::new(t2));

        assert_eq!(snapshot.traffic_totals(), (15, 6));
    }

    #[test]
    fn failed_resource_display() {
        let scoped = FailedResource::new(ResourceKind::Traffic, Some("o/a"));
        assert_eq!(scoped.to_string(), "traffic for o/a");

        let bare = FailedResource::new(ResourceKind::Events, None);
        assert_eq!(bare.to_string(), "events");
    }

    #[test]
    fn failed_resources_order_deterministically() {
        let mut set = BTreeSet::new();
        let _ = set.insert(FailedResource::new(ResourceKind::Traffic, Some("o/b")));
        let _ = set.insert(FailedResource::new(ResourceKind::Languages, Some("o/a")));
        let _ = set.insert(FailedResource::new(ResourceKind::Traffic, Some("o/a")));

        let rendered: Vec<String> = set.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["languages for o/a", "traffic for o/a", "traffic for o/b"]);
    }
}
