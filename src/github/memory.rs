//! In-memory [`DataSource`] used by pipeline tests.

use super::*;
use anyhow::anyhow;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemorySource {
    pub repos: Vec<Repository>,
    pub contributors: HashMap<String, Vec<Contributor>>,
    pub commits: HashMap<String, Vec<Commit>>,
    pub languages: HashMap<String, LanguageBytes>,
    pub users: HashMap<String, User>,
    pub emails: HashMap<String, String>,
    pub failing_repos: HashSet<String>,
    pub budget: Option<u32>,
    pub lookups: AtomicUsize,
    pub visited: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn repo(mut self, name: &str, stars: u64, pushed_at: Option<DateTime<Utc>>) -> Self {
        self.repos.push(Repository {
            name: name.to_string(),
            description: None,
            stars,
            forks: stars / 2,
            open_issues: 0,
            language: None,
            pushed_at,
            fork: false,
            archived: false,
        });
        self
    }

    pub fn contributor(mut self, repo: &str, login: &str, contributions: u64) -> Self {
        self.contributors
            .entry(repo.to_string())
            .or_default()
            .push(Contributor {
                login: login.to_string(),
                avatar_url: Some(format!("https://avatars.githubusercontent.com/{login}")),
                html_url: Some(format!("https://github.com/{login}")),
                contributions,
                kind: Some("User".to_string()),
            });
        self
    }

    pub fn commit(mut self, repo: &str, message: &str, author: Option<(&str, &str)>) -> Self {
        let commits = self.commits.entry(repo.to_string()).or_default();
        commits.push(Commit {
            sha: format!("{repo}-{}", commits.len()),
            commit: CommitDetail {
                message: message.to_string(),
                author: author.map(|(name, email)| GitSignature {
                    name: Some(name.to_string()),
                    email: Some(email.to_string()),
                    date: None,
                }),
            },
            author: None,
        });
        self
    }

    pub fn language(mut self, repo: &str, language: &str, bytes: u64) -> Self {
        self.languages
            .entry(repo.to_string())
            .or_default()
            .insert(language.to_string(), bytes);
        self
    }

    pub fn user(mut self, login: &str, name: &str, emails: &[&str]) -> Self {
        self.users.insert(
            login.to_lowercase(),
            User {
                login: login.to_string(),
                name: Some(name.to_string()),
                avatar_url: Some(format!("https://avatars.githubusercontent.com/{login}")),
                html_url: Some(format!("https://github.com/{login}")),
            },
        );
        for email in emails {
            self.emails.insert(email.to_lowercase(), login.to_string());
        }
        self
    }

    pub fn failing(mut self, repo: &str) -> Self {
        self.failing_repos.insert(repo.to_string());
        self
    }

    fn check(&self, repo: &str) -> Result<()> {
        if self.failing_repos.contains(repo) {
            return Err(anyhow!("API error (500) for {repo}"));
        }
        Ok(())
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn list_repositories(&self, _org: &str) -> Result<Vec<Repository>> {
        Ok(self.repos.clone())
    }

    async fn list_contributors(&self, _org: &str, repo: &str) -> Result<Vec<Contributor>> {
        self.check(repo)?;
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(repo.to_string());
        }
        Ok(self.contributors.get(repo).cloned().unwrap_or_default())
    }

    async fn list_commits(&self, _org: &str, repo: &str, limit: usize) -> Result<Vec<Commit>> {
        self.check(repo)?;
        let mut commits = self.commits.get(repo).cloned().unwrap_or_default();
        commits.truncate(limit);
        Ok(commits)
    }

    async fn count_commits(&self, _org: &str, repo: &str) -> Result<u64> {
        self.check(repo)?;
        Ok(self.commits.get(repo).map_or(0, |c| c.len() as u64))
    }

    async fn list_languages(&self, _org: &str, repo: &str) -> Result<LanguageBytes> {
        self.check(repo)?;
        Ok(self.languages.get(repo).cloned().unwrap_or_default())
    }

    async fn get_user(&self, login: &str) -> Result<Option<User>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.users.get(&login.to_lowercase()).cloned())
    }

    async fn search_user_by_email(&self, email: &str) -> Result<Option<String>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.emails.get(&email.to_lowercase()).cloned())
    }

    fn remaining_budget(&self) -> Option<u32> {
        self.budget
    }
}
