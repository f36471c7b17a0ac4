use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod languages;

use crate::github::{LanguageBytes, Repository};
use crate::registry::ContributorRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub description: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub language: Option<String>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub is_primary: bool,
    pub languages: BTreeMap<String, u64>,
    pub lines_of_code: u64,
    pub contributors: u64,
    pub commits: u64,
}

impl RepoSummary {
    pub fn new(
        repo: &Repository,
        is_primary: bool,
        language_bytes: &LanguageBytes,
        contributors: u64,
        commits: u64,
    ) -> Self {
        let languages = languages::lines_by_language(language_bytes);
        let lines_of_code = languages.values().sum();

        Self {
            name: repo.name.clone(),
            description: repo.description.clone(),
            stars: repo.stars,
            forks: repo.forks,
            open_issues: repo.open_issues,
            language: repo.language.clone(),
            pushed_at: repo.pushed_at,
            is_primary,
            languages,
            lines_of_code,
            contributors,
            commits,
        }
    }
}

/// Organization-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgAggregate {
    pub total_repos: u64,
    pub total_stars: u64,
    pub total_forks: u64,
    pub total_open_issues: u64,
    pub total_commits: u64,
    pub total_lines_of_code: u64,
    pub total_contributors: u64,
    pub verified_contributors: u64,
    pub pending_contributors: u64,
    pub total_contributions: u64,
    pub languages: BTreeMap<String, u64>,
}

impl OrgAggregate {
    pub fn from_parts(repos: &[RepoSummary], registry: &ContributorRegistry) -> Self {
        let mut aggregate = Self {
            total_repos: repos.len() as u64,
            total_contributors: registry.len() as u64,
            total_contributions: registry.total_contributions(),
            ..Self::default()
        };

        for repo in repos {
            aggregate.total_stars += repo.stars;
            aggregate.total_forks += repo.forks;
            aggregate.total_open_issues += repo.open_issues;
            aggregate.total_commits += repo.commits;
            aggregate.total_lines_of_code += repo.lines_of_code;
            for (language, lines) in &repo.languages {
                *aggregate.languages.entry(language.clone()).or_default() += lines;
            }
        }

        for record in registry.records() {
            if record.is_verified() {
                aggregate.verified_contributors += 1;
            }
            if record.pending_resolution {
                aggregate.pending_contributors += 1;
            }
        }

        aggregate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Normalizer;

    fn repository(name: &str, stars: u64, forks: u64) -> Repository {
        Repository {
            name: name.to_string(),
            description: None,
            stars,
            forks,
            open_issues: 1,
            language: Some("Rust".to_string()),
            pushed_at: None,
            fork: false,
            archived: false,
        }
    }

    #[test]
    fn aggregate_sums_repos_and_counts_contributors() {
        let mut bytes = LanguageBytes::new();
        bytes.insert("Rust".to_string(), 3500);

        let repos = vec![
            RepoSummary::new(&repository("core", 10, 2), true, &bytes, 3, 120),
            RepoSummary::new(&repository("docs", 1, 0), false, &LanguageBytes::new(), 1, 8),
        ];

        let mut registry = ContributorRegistry::new(Normalizer::new("github.com").unwrap());
        registry.upsert_direct("octocat", None, None, 100, "core");
        registry.upsert_direct("hubot", None, None, 28, "docs");

        let aggregate = OrgAggregate::from_parts(&repos, &registry);
        assert_eq!(aggregate.total_repos, 2);
        assert_eq!(aggregate.total_stars, 11);
        assert_eq!(aggregate.total_forks, 2);
        assert_eq!(aggregate.total_open_issues, 2);
        assert_eq!(aggregate.total_commits, 128);
        assert_eq!(aggregate.total_lines_of_code, 100);
        assert_eq!(aggregate.languages["Rust"], 100);
        assert_eq!(aggregate.total_contributors, 2);
        assert_eq!(aggregate.total_contributions, 128);
        assert_eq!(aggregate.verified_contributors, 0);
    }
}
