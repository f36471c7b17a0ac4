use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::identity::{CandidateIdentity, Normalizer};

pub mod dedup;
pub mod scoring;

pub use dedup::DedupReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub canonical_login: String,
    pub display_login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
    pub contributions: u64,
    pub repositories: BTreeSet<String>,
    pub verified_handle: Option<String>,
    pub aliases: Vec<Alias>,
    pub pending_resolution: bool,
}

impl ContributorRecord {
    fn new(login: &str) -> Self {
        Self {
            canonical_login: login.to_lowercase(),
            display_login: login.to_string(),
            name: None,
            email: None,
            avatar_url: None,
            profile_url: None,
            contributions: 0,
            repositories: BTreeSet::new(),
            verified_handle: None,
            aliases: Vec::new(),
            pending_resolution: false,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified_handle.is_some()
    }

    pub fn email_key(&self) -> Option<String> {
        self.email.as_ref().map(|e| e.to_lowercase())
    }
}

/// A record folded into another during deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub login: String,
    pub canonical_login: String,
    pub match_type: MatchType,
    pub contributions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    SharedEmail,
    SharedVerifiedHandle,
    SharedNameToken,
}

/// An account confirmed by the user-lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
}

/// Contributors keyed by lowercased login, kept in first-seen order.
pub struct ContributorRegistry {
    records: IndexMap<String, ContributorRecord>,
    emails: HashMap<String, String>,
    normalizer: Normalizer,
}

impl ContributorRegistry {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            records: IndexMap::new(),
            emails: HashMap::new(),
            normalizer,
        }
    }

    /// Records a contributor from a repository's contributor listing. Deltas are
    /// summed, so feeding the same listing twice counts it twice.
    pub fn upsert_direct(
        &mut self,
        login: &str,
        avatar_url: Option<&str>,
        profile_url: Option<&str>,
        contribution_delta: u64,
        repo: &str,
    ) -> Option<String> {
        let login = login.trim();
        if login.is_empty() {
            return None;
        }

        let key = login.to_lowercase();
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| ContributorRecord::new(login));

        record.contributions += contribution_delta;
        record.repositories.insert(repo.to_string());
        if record.avatar_url.is_none() {
            record.avatar_url = avatar_url.map(str::to_string);
        }
        if record.profile_url.is_none() {
            record.profile_url = profile_url.map(str::to_string);
        }

        Some(key)
    }

    /// Records one attribution found in commit data. Merges into an existing
    /// record when the normalized handle or the stored email matches; candidates
    /// that cannot be normalized are dropped.
    pub fn upsert_heuristic(&mut self, candidate: &CandidateIdentity, repo: &str) -> Option<String> {
        let handle = self.normalizer.normalize(
            candidate.email.as_deref().unwrap_or_default(),
            candidate.name.as_deref().unwrap_or_default(),
        )?;

        let key = handle.to_lowercase();
        if key.is_empty() {
            return None;
        }

        let existing = if self.records.contains_key(&key) {
            Some(key.clone())
        } else {
            candidate
                .email_key()
                .and_then(|email| self.emails.get(&email).cloned())
        };

        if let Some(existing) = existing {
            if let Some(record) = self.records.get_mut(&existing) {
                record.contributions += 1;
                record.repositories.insert(repo.to_string());
                return Some(existing);
            }
        }

        let mut record = ContributorRecord::new(&handle);
        record.name = candidate.name.clone();
        record.email = candidate.email.clone();
        record.contributions = 1;
        record.repositories.insert(repo.to_string());
        record.pending_resolution = candidate.email.is_some();

        if let Some(email) = record.email_key() {
            self.emails.entry(email).or_insert_with(|| key.clone());
        }
        debug!(
            "New heuristic contributor {} via {:?}",
            record.display_login, candidate.source
        );
        self.records.insert(key.clone(), record);

        Some(key)
    }

    /// Lowercased emails of records still waiting on a lookup.
    pub fn pending_emails(&self) -> BTreeSet<String> {
        self.records
            .values()
            .filter(|r| r.pending_resolution)
            .filter_map(ContributorRecord::email_key)
            .collect()
    }

    /// Upgrades pending records whose email was resolved. Returns how many
    /// records were verified.
    pub fn apply_verified(&mut self, resolved: &HashMap<String, VerifiedIdentity>) -> usize {
        let mut verified = 0;

        for record in self.records.values_mut().filter(|r| r.pending_resolution) {
            let Some(identity) = record.email_key().and_then(|e| resolved.get(&e)) else {
                continue;
            };

            record.verified_handle = Some(identity.login.clone());
            if identity.name.is_some() {
                record.name = identity.name.clone();
            }
            if identity.avatar_url.is_some() {
                record.avatar_url = identity.avatar_url.clone();
            }
            if identity.profile_url.is_some() {
                record.profile_url = identity.profile_url.clone();
            }
            record.pending_resolution = false;
            verified += 1;
        }

        verified
    }

    #[cfg(test)]
    pub fn get(&self, login: &str) -> Option<&ContributorRecord> {
        self.records.get(&login.to_lowercase())
    }

    pub fn records(&self) -> impl Iterator<Item = &ContributorRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_contributions(&self) -> u64 {
        self.records.values().map(|r| r.contributions).sum()
    }

    /// The `limit` largest contributors, ties in first-seen order.
    pub fn top(&self, limit: usize) -> Vec<&ContributorRecord> {
        let mut sorted: Vec<_> = self.records.values().collect();
        sorted.sort_by(|a, b| b.contributions.cmp(&a.contributions));
        sorted.truncate(limit);
        sorted
    }

    fn reindex_emails(&mut self) {
        self.emails.clear();
        for (key, record) in &self.records {
            if let Some(email) = record.email_key() {
                self.emails.entry(email).or_insert_with(|| key.clone());
            }
        }
    }
}
