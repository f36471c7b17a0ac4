use super::*;
use crate::identity::normalizer::name_token;
use std::collections::HashSet;
use tracing::{debug, info};

/// Logins believed by one criterion to be the same person, in registry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSet {
    pub match_type: MatchType,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub rounds: usize,
    pub merges: usize,
    pub absorbed: usize,
}

const MIN_TOKEN_LEN: usize = 3;

impl ContributorRegistry {
    /// Merges records that denote the same person. Discovery is repeated until
    /// a round merges nothing, so running this again is a no-op.
    pub fn deduplicate(&mut self) -> DedupReport {
        let before = self.len();
        let mut report = DedupReport::default();

        // Every productive round removes at least one record.
        while report.rounds <= before {
            let sets = self.match_sets();
            report.rounds += 1;

            let merges = self.merge_round(sets);
            if merges == 0 {
                break;
            }
            report.merges += merges;
            self.reindex_emails();
        }

        report.absorbed = before - self.len();
        info!(
            "Deduplication complete: {} merges absorbed {} records in {} rounds, {} contributors remain",
            report.merges,
            report.absorbed,
            report.rounds,
            self.len()
        );
        report
    }

    /// Match-sets by shared email, then shared verified handle, then shared
    /// name token. Sets with identical membership are reported once.
    pub fn match_sets(&self) -> Vec<MatchSet> {
        let mut by_email: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut by_handle: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut by_token: IndexMap<String, Vec<String>> = IndexMap::new();

        for (key, record) in &self.records {
            if let Some(email) = record.email_key() {
                by_email.entry(email).or_default().push(key.clone());
            }
            if let Some(handle) = &record.verified_handle {
                by_handle
                    .entry(handle.to_lowercase())
                    .or_default()
                    .push(key.clone());
            }
            for token in name_tokens(record) {
                by_token.entry(token).or_default().push(key.clone());
            }
        }

        let mut sets = Vec::new();
        let mut seen: HashSet<BTreeSet<String>> = HashSet::new();
        let groups = [
            (MatchType::SharedEmail, by_email),
            (MatchType::SharedVerifiedHandle, by_handle),
            (MatchType::SharedNameToken, by_token),
        ];

        for (match_type, groups) in groups {
            for members in groups.into_values().filter(|m| m.len() >= 2) {
                let membership: BTreeSet<String> = members.iter().cloned().collect();
                if seen.insert(membership) {
                    sets.push(MatchSet {
                        match_type,
                        members,
                    });
                }
            }
        }

        sets
    }

    fn merge_round(&mut self, sets: Vec<MatchSet>) -> usize {
        let mut absorbed: HashSet<String> = HashSet::new();
        let mut merges = 0;

        for set in sets {
            let live: Vec<String> = set
                .members
                .into_iter()
                .filter(|key| !absorbed.contains(key) && self.records.contains_key(key))
                .collect();
            if live.len() < 2 {
                continue;
            }

            let members: Vec<&ContributorRecord> =
                live.iter().filter_map(|key| self.records.get(key)).collect();
            let Some(primary_index) = scoring::select_primary(&members) else {
                continue;
            };
            let primary_key = live[primary_index].clone();

            let others: Vec<ContributorRecord> = live
                .iter()
                .filter(|key| **key != primary_key)
                .filter_map(|key| self.records.shift_remove(key))
                .collect();

            let Some(primary) = self.records.get_mut(&primary_key) else {
                continue;
            };
            for other in others {
                debug!(
                    "Merging {} into {} ({:?})",
                    other.display_login, primary.display_login, set.match_type
                );
                absorbed.insert(other.canonical_login.clone());
                absorb(primary, other, set.match_type);
            }
            merges += 1;
        }

        merges
    }
}

fn absorb(primary: &mut ContributorRecord, other: ContributorRecord, match_type: MatchType) {
    primary.contributions += other.contributions;
    primary.repositories.extend(other.repositories);

    if primary.verified_handle.is_none() && other.verified_handle.is_some() {
        primary.verified_handle = other.verified_handle;
        if other.name.is_some() {
            primary.name = other.name;
        }
        if other.avatar_url.is_some() {
            primary.avatar_url = other.avatar_url;
        }
        if other.profile_url.is_some() {
            primary.profile_url = other.profile_url;
        }
        primary.pending_resolution = false;
    } else {
        if primary.name.is_none() {
            primary.name = other.name;
        }
        if primary.avatar_url.is_none() {
            primary.avatar_url = other.avatar_url;
        }
        if primary.profile_url.is_none() {
            primary.profile_url = other.profile_url;
        }
    }
    if primary.email.is_none() {
        primary.email = other.email;
    }

    primary.aliases.push(Alias {
        login: other.display_login,
        canonical_login: other.canonical_login,
        match_type,
        contributions: other.contributions,
    });
    primary.aliases.extend(other.aliases);
}

fn name_tokens(record: &ContributorRecord) -> BTreeSet<String> {
    let email_local = record
        .email
        .as_deref()
        .and_then(|e| e.split('@').next())
        .map(name_token);

    [
        Some(record.canonical_login.clone()),
        Some(name_token(&record.canonical_login)),
        record.verified_handle.as_deref().map(name_token),
        email_local,
    ]
    .into_iter()
    .flatten()
    .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
    .collect()
}
