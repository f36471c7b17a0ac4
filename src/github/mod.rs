use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod client;
pub mod links;
#[cfg(test)]
pub mod memory;

pub use client::GitHubClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "stargazers_count")]
    pub stars: u64,
    #[serde(default, rename = "forks_count")]
    pub forks: u64,
    #[serde(default, rename = "open_issues_count")]
    pub open_issues: u64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub contributions: u64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl Contributor {
    pub fn is_bot(&self) -> bool {
        self.kind.as_deref() == Some("Bot") || self.login.ends_with("[bot]")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetail,
    /// The linked account, absent when the git author email maps to no user.
    #[serde(default)]
    pub author: Option<AccountRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<GitSignature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitSignature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRef {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Byte counts per language, as reported by the host.
pub type LanguageBytes = BTreeMap<String, u64>;

/// Everything the collector needs from the hosting service.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn list_repositories(&self, org: &str) -> Result<Vec<Repository>>;

    async fn list_contributors(&self, org: &str, repo: &str) -> Result<Vec<Contributor>>;

    /// Most recent commits first, at most `limit`.
    async fn list_commits(&self, org: &str, repo: &str, limit: usize) -> Result<Vec<Commit>>;

    async fn count_commits(&self, org: &str, repo: &str) -> Result<u64>;

    async fn list_languages(&self, org: &str, repo: &str) -> Result<LanguageBytes>;

    async fn get_user(&self, login: &str) -> Result<Option<User>>;

    /// Login of the first account whose public email matches.
    async fn search_user_by_email(&self, email: &str) -> Result<Option<String>>;

    /// Remaining request budget, if the host has reported one yet.
    fn remaining_budget(&self) -> Option<u32>;
}
