use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod history;
pub mod reporter;

pub use reporter::Reporter;

use crate::analysis::{OrgAggregate, RepoSummary};
use crate::collector::Collection;
use crate::registry::{ContributorRecord, DedupReport};

/// Everything written to `snapshot.json` for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub organization: String,
    pub generated_at: DateTime<Utc>,
    pub aggregate: OrgAggregate,
    pub repositories: Vec<RepoSummary>,
    pub top_contributors: Vec<ContributorRecord>,
    pub resolved_identities: usize,
    pub deduplication: DedupReport,
}

impl Snapshot {
    pub fn new(organization: &str, collection: &Collection, top: usize, now: DateTime<Utc>) -> Self {
        Self {
            organization: organization.to_string(),
            generated_at: now,
            aggregate: OrgAggregate::from_parts(&collection.repos, &collection.registry),
            repositories: collection.repos.clone(),
            top_contributors: collection
                .registry
                .top(top)
                .into_iter()
                .cloned()
                .collect(),
            resolved_identities: collection.verified,
            deduplication: collection.dedup.clone(),
        }
    }
}

/// One point of the `history.json` time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub repos: u64,
    pub stars: u64,
    pub forks: u64,
    pub contributors: u64,
    pub commits: u64,
    pub lines_of_code: u64,
}

impl From<&Snapshot> for HistoryEntry {
    fn from(snapshot: &Snapshot) -> Self {
        let aggregate = &snapshot.aggregate;
        Self {
            timestamp: snapshot.generated_at,
            repos: aggregate.total_repos,
            stars: aggregate.total_stars,
            forks: aggregate.total_forks,
            contributors: aggregate.total_contributors,
            commits: aggregate.total_commits,
            lines_of_code: aggregate.total_lines_of_code,
        }
    }
}
