use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::identity::Strictness;

/// Environment prefix for overrides, e.g. `ORGPULSE__OUTPUT__TOP_CONTRIBUTORS=25`.
const ENV_PREFIX: &str = "ORGPULSE";

// Empty lists in the seeded defaults are dropped by the `config` crate, so
// every section falls back to its `Default` field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub collection: CollectionConfig,
    pub resolver: ResolverConfig,
    pub identity: IdentityConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectionConfig {
    pub api_url: String,
    pub flagship_repos: Vec<String>,
    pub recent_days: i64,
    pub fan_out: usize,
    pub max_commits_per_repo: usize,
    pub page_size: usize,
    pub page_delay_ms: u64,
    pub repo_delay_ms: u64,
    pub min_rate_remaining: u32,
    pub include_forks: bool,
    pub include_archived: bool,
    pub exclude_bots: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    pub enabled: bool,
    pub batch_size: usize,
    pub request_delay_ms: u64,
    pub batch_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub strictness: Strictness,
    pub noreply_host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub top_contributors: usize,
    pub history_limit: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            flagship_repos: Vec::new(),
            recent_days: 30,
            fan_out: 3,
            max_commits_per_repo: 300,
            page_size: 100,
            page_delay_ms: 100,
            repo_delay_ms: 250,
            min_rate_remaining: 100,
            include_forks: true,
            include_archived: true,
            exclude_bots: true,
            request_timeout_secs: 30,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 10,
            request_delay_ms: 200,
            batch_delay_ms: 1000,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Lenient,
            noreply_host: "github.com".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "data".to_string(),
            top_contributors: 50,
            history_limit: 100,
        }
    }
}

impl Config {
    /// Layers built-in defaults, an optional config file and `ORGPULSE__*`
    /// environment variables, in that order.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&Self::default())
            .context("Failed to seed configuration defaults")?;

        let mut builder = ::config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("collection.flagship_repos")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        Ok(config.sanitized())
    }

    fn sanitized(mut self) -> Self {
        self.collection.fan_out = self.collection.fan_out.clamp(1, 3);
        self.collection.page_size = self.collection.page_size.clamp(1, 100);
        self.resolver.batch_size = self.resolver.batch_size.max(1);
        self.output.history_limit = self.output.history_limit.max(1);
        self
    }
}

impl CollectionConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn repo_delay(&self) -> Duration {
        Duration::from_millis(self.repo_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ResolverConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}
