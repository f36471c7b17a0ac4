use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::RepoSummary;
use crate::config::Config;
use crate::github::{Commit, Contributor, DataSource, LanguageBytes, Repository};
use crate::identity::{CandidateIdentity, CoAuthorExtractor, Heuristic, Normalizer};
use crate::registry::{ContributorRegistry, DedupReport};
use crate::resolver::IdentityResolver;

/// Result of one collection run, ready to be reported.
pub struct Collection {
    pub repos: Vec<RepoSummary>,
    pub registry: ContributorRegistry,
    pub verified: usize,
    pub dedup: DedupReport,
}

struct RepoFetch {
    repo: Repository,
    is_primary: bool,
    contributors: Vec<Contributor>,
    commits: Vec<Commit>,
    commit_count: u64,
    languages: LanguageBytes,
}

pub struct Collector<'a, S: DataSource + ?Sized> {
    source: &'a S,
    config: &'a Config,
    extractor: CoAuthorExtractor,
}

impl<'a, S: DataSource + ?Sized> Collector<'a, S> {
    pub fn new(source: &'a S, config: &'a Config) -> Result<Self> {
        let extractor =
            CoAuthorExtractor::new(config.identity.strictness, &config.identity.noreply_host)?;

        Ok(Self {
            source,
            config,
            extractor,
        })
    }

    /// Scans every repository of `org`, verifies email-only identities and
    /// deduplicates the result. Only failing to list the repositories is fatal.
    pub async fn collect(&self, org: &str) -> Result<Collection> {
        let listed = self
            .source
            .list_repositories(org)
            .await
            .with_context(|| format!("Failed to list repositories of {org}"))?;
        let planned = self.plan(listed, Utc::now());

        info!(
            "Collecting {} repositories of {} ({} primary)",
            planned.len(),
            org,
            planned.iter().filter(|(_, primary)| *primary).count()
        );

        let mut registry = ContributorRegistry::new(Normalizer::new(&self.config.identity.noreply_host)?);
        let mut repos = Vec::with_capacity(planned.len());

        let pb = ProgressBar::new(planned.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} repositories {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }

        let collection = &self.config.collection;
        for (i, chunk) in planned.chunks(collection.fan_out).enumerate() {
            if i > 0 {
                tokio::time::sleep(collection.repo_delay()).await;
            }

            let fetched = join_all(
                chunk
                    .iter()
                    .map(|(repo, primary)| self.fetch_repo(org, repo, *primary)),
            )
            .await;

            // Registry updates stay on this task, in repository order.
            for fetch in fetched {
                pb.set_message(fetch.repo.name.clone());
                repos.push(self.ingest(&mut registry, fetch));
                pb.inc(1);
            }
        }
        pb.finish_and_clear();

        if registry.is_empty() {
            warn!("No contributors found in {}", org);
        }
        info!(
            "Scan complete: {} contributors across {} repositories",
            registry.len(),
            repos.len()
        );

        let verified = self.verify(&mut registry).await?;
        let dedup = registry.deduplicate();

        Ok(Collection {
            repos,
            registry,
            verified,
            dedup,
        })
    }

    /// Applies the fork/archive filters and moves primary repositories (named
    /// flagships or recently pushed) to the front, keeping listing order.
    fn plan(&self, repos: Vec<Repository>, now: DateTime<Utc>) -> Vec<(Repository, bool)> {
        let collection = &self.config.collection;
        let recent = now - ChronoDuration::days(collection.recent_days);

        let (primary, rest): (Vec<_>, Vec<_>) = repos
            .into_iter()
            .filter(|r| collection.include_forks || !r.fork)
            .filter(|r| collection.include_archived || !r.archived)
            .map(|r| {
                let flagship = collection
                    .flagship_repos
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(&r.name));
                let is_primary = flagship || r.pushed_at.is_some_and(|p| p >= recent);
                (r, is_primary)
            })
            .partition(|(_, is_primary)| *is_primary);

        primary.into_iter().chain(rest).collect()
    }

    async fn fetch_repo(&self, org: &str, repo: &Repository, is_primary: bool) -> RepoFetch {
        let name = repo.name.as_str();
        let limit = self.config.collection.max_commits_per_repo;

        let contributors = contained(
            "contributors",
            name,
            self.source.list_contributors(org, name).await,
        );
        let commits = contained("commits", name, self.source.list_commits(org, name, limit).await);
        let commit_count = contained(
            "commit count",
            name,
            self.source.count_commits(org, name).await,
        );
        let languages = contained("languages", name, self.source.list_languages(org, name).await);

        debug!(
            "Fetched {}: {} contributors, {} recent commits, {} total",
            name,
            contributors.len(),
            commits.len(),
            commit_count
        );

        RepoFetch {
            repo: repo.clone(),
            is_primary,
            contributors,
            commits,
            commit_count,
            languages,
        }
    }

    fn ingest(&self, registry: &mut ContributorRegistry, fetch: RepoFetch) -> RepoSummary {
        let repo = fetch.repo.name.as_str();
        let exclude_bots = self.config.collection.exclude_bots;

        let mut listed = 0;
        for contributor in &fetch.contributors {
            if exclude_bots && contributor.is_bot() {
                continue;
            }
            registry.upsert_direct(
                &contributor.login,
                contributor.avatar_url.as_deref(),
                contributor.html_url.as_deref(),
                contributor.contributions,
                repo,
            );
            listed += 1;
        }

        // Extraction is pure, so it fans out; upserts happen in commit order.
        let extracted: Vec<Vec<CandidateIdentity>> = fetch
            .commits
            .par_iter()
            .map(|commit| self.commit_candidates(commit))
            .collect();

        let mut attributions = 0;
        for candidate in extracted.into_iter().flatten() {
            if exclude_bots && is_bot_identity(&candidate) {
                continue;
            }
            if registry.upsert_heuristic(&candidate, repo).is_some() {
                attributions += 1;
            }
        }
        debug!("{}: {} listed contributors, {} commit attributions", repo, listed, attributions);

        RepoSummary::new(
            &fetch.repo,
            fetch.is_primary,
            &fetch.languages,
            listed,
            fetch.commit_count,
        )
    }

    /// Co-authors named in the message, plus the git author when the commit
    /// is not linked to an account (linked authors come from the listing).
    fn commit_candidates(&self, commit: &Commit) -> Vec<CandidateIdentity> {
        let author = commit.commit.author.as_ref();
        let author_email = author
            .and_then(|a| a.email.as_deref())
            .map(str::to_lowercase);

        let mut candidates: Vec<CandidateIdentity> = self
            .extractor
            .extract(&commit.commit.message)
            .into_iter()
            .filter(|c| c.email_key() != author_email)
            .collect();

        if commit.author.is_none() {
            if let Some(author) = author {
                let candidate = CandidateIdentity::new(
                    author.name.as_deref(),
                    author.email.as_deref(),
                    Heuristic::CommitAuthor,
                );
                if candidate.name.is_some() || candidate.email.is_some() {
                    candidates.push(candidate);
                }
            }
        }

        candidates
    }

    async fn verify(&self, registry: &mut ContributorRegistry) -> Result<usize> {
        if !self.config.resolver.enabled {
            info!("Identity resolution disabled");
            return Ok(0);
        }

        let pending = registry.pending_emails();
        let resolver = IdentityResolver::new(
            self.source,
            &self.config.resolver,
            self.config.collection.min_rate_remaining,
            &self.config.identity.noreply_host,
        )?;
        let resolved = resolver.resolve_batch(&pending).await;

        Ok(registry.apply_verified(&resolved))
    }
}

fn contained<T: Default>(what: &str, repo: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!("Skipping {} of {}: {:#}", what, repo, e);
        T::default()
    })
}

fn is_bot_identity(candidate: &CandidateIdentity) -> bool {
    let looks_like_bot = |s: &Option<String>| {
        s.as_deref()
            .is_some_and(|s| s.to_lowercase().contains("[bot]"))
    };
    looks_like_bot(&candidate.name) || looks_like_bot(&candidate.email)
}
