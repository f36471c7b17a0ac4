use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod analysis;
mod collector;
mod config;
mod github;
mod identity;
mod output;
mod registry;
mod resolver;

use collector::Collector;
use config::Config;
use github::GitHubClient;
use identity::Strictness;
use output::{Reporter, Snapshot};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Organization to collect metrics for
    #[arg(short, long, env = "GITHUB_ORG")]
    org: String,

    /// API token (unauthenticated requests get a much smaller rate budget)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Optional tuning file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for snapshot.json and history.json
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Number of contributors listed in the snapshot
    #[arg(short, long)]
    top: Option<usize>,

    /// Which co-author heuristics to trust
    #[arg(short, long, value_enum)]
    strictness: Option<Strictness>,

    /// Skip email-to-account lookups
    #[arg(long)]
    skip_resolution: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    println!(
        "{}",
        "OrgPulse - Organization Metrics Collector".bright_cyan().bold()
    );
    println!("Organization: {}", cli.org.bright_white());

    // Configuration: defaults, file, environment, then CLI flags
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.display().to_string();
    }
    if let Some(top) = cli.top {
        config.output.top_contributors = top;
    }
    if let Some(strictness) = cli.strictness {
        config.identity.strictness = strictness;
    }
    if cli.skip_resolution {
        config.resolver.enabled = false;
    }

    // Setup failures exit before anything is fetched
    let reporter = Reporter::new(&config.output.dir, config.output.history_limit)?;
    let client = GitHubClient::new(&config.collection, cli.token)
        .context("Failed to build API client")?;

    info!("Starting collection for {}...", cli.org);
    let collection = Collector::new(&client, &config)?.collect(&cli.org).await?;

    // Write snapshot and history
    let snapshot = Snapshot::new(
        &cli.org,
        &collection,
        config.output.top_contributors,
        Utc::now(),
    );
    let history_len = reporter.write(&snapshot)?;

    // Summary
    let aggregate = &snapshot.aggregate;
    println!("\n{}", "Collection complete!".bright_green().bold());
    println!(
        "  Repositories: {}  Stars: {}  Forks: {}",
        aggregate.total_repos.to_string().bright_white(),
        aggregate.total_stars.to_string().bright_white(),
        aggregate.total_forks.to_string().bright_white()
    );
    println!(
        "  Contributors: {} ({} verified, {} pending, {} merged)",
        aggregate.total_contributors.to_string().bright_white(),
        aggregate.verified_contributors.to_string().green(),
        aggregate.pending_contributors.to_string().yellow(),
        snapshot.deduplication.absorbed
    );
    println!(
        "  Commits: {}  Lines of code: ~{}",
        aggregate.total_commits.to_string().bright_white(),
        aggregate.total_lines_of_code.to_string().bright_white()
    );
    println!(
        "  Output: {} ({} history entries)",
        reporter.snapshot_path().display().to_string().bright_white(),
        history_len
    );

    Ok(())
}
