use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::github::{DataSource, User};
use crate::registry::VerifiedIdentity;

/// Upgrades email-only identities into verified accounts via the user-lookup
/// endpoints, throttled to stay inside the rate budget.
pub struct IdentityResolver<'a, S: DataSource + ?Sized> {
    source: &'a S,
    config: &'a ResolverConfig,
    min_remaining: u32,
    noreply: Regex,
}

impl<'a, S: DataSource + ?Sized> IdentityResolver<'a, S> {
    pub fn new(
        source: &'a S,
        config: &'a ResolverConfig,
        min_remaining: u32,
        noreply_host: &str,
    ) -> Result<Self> {
        let noreply = Regex::new(&format!(
            r"(?i)^(?:\d+\+)?([A-Za-z0-9][A-Za-z0-9-]*)@users\.noreply\.{}$",
            regex::escape(noreply_host)
        ))
        .context("Failed to compile no-reply address pattern")?;

        Ok(Self {
            source,
            config,
            min_remaining,
            noreply,
        })
    }

    /// Looks up every email, keyed by the lowercased address. Misses and lookup
    /// failures are left out of the result; a low rate budget skips whatever
    /// is left.
    pub async fn resolve_batch(&self, emails: &BTreeSet<String>) -> HashMap<String, VerifiedIdentity> {
        let mut resolved = HashMap::new();
        if emails.is_empty() {
            return resolved;
        }

        let emails: Vec<&String> = emails.iter().collect();
        info!("Resolving {} unverified email identities", emails.len());

        let pb = ProgressBar::new(emails.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} lookups ({eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut attempted = 0;
        'batches: for (i, batch) in emails.chunks(self.config.batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.batch_delay()).await;
            }

            for (j, email) in batch.iter().enumerate() {
                if self.budget_low() {
                    warn!(
                        "Rate budget below {}, skipping {} remaining lookups",
                        self.min_remaining,
                        emails.len() - attempted
                    );
                    break 'batches;
                }
                if j > 0 {
                    tokio::time::sleep(self.config.request_delay()).await;
                }

                match self.resolve_one(email).await {
                    Ok(Some(identity)) => {
                        debug!("Resolved {} to {}", email, identity.login);
                        resolved.insert(email.to_lowercase(), identity);
                    }
                    Ok(None) => debug!("No account found for {}", email),
                    Err(e) => debug!("Lookup for {} failed: {:#}", email, e),
                }
                attempted += 1;
                pb.inc(1);
            }
        }

        pb.finish_and_clear();
        info!("Resolved {} of {} email identities", resolved.len(), emails.len());
        resolved
    }

    /// Handle encoded in a no-reply address, if it is one.
    pub fn noreply_handle(&self, email: &str) -> Option<String> {
        self.noreply
            .captures(email.trim())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    async fn resolve_one(&self, email: &str) -> Result<Option<VerifiedIdentity>> {
        if let Some(handle) = self.noreply_handle(email) {
            return Ok(self.source.get_user(&handle).await?.map(verified));
        }

        let Some(login) = self.source.search_user_by_email(email).await? else {
            return Ok(None);
        };

        let profile = match self.source.get_user(&login).await {
            Ok(profile) => profile,
            Err(e) => {
                debug!("Profile fetch for {} failed: {:#}", login, e);
                None
            }
        };

        Ok(Some(profile.map(verified).unwrap_or_else(|| VerifiedIdentity {
            login,
            name: None,
            avatar_url: None,
            profile_url: None,
        })))
    }

    fn budget_low(&self) -> bool {
        self.source
            .remaining_budget()
            .is_some_and(|remaining| remaining < self.min_remaining)
    }
}

fn verified(user: User) -> VerifiedIdentity {
    VerifiedIdentity {
        login: user.login,
        name: user.name,
        avatar_url: user.avatar_url,
        profile_url: user.html_url,
    }
}
