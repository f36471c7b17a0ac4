use anyhow::{Context, Result};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Prefix of synthetic handles handed out when nothing better can be derived.
pub const FALLBACK_PREFIX: &str = "contributor-";

const FALLBACK_SPACE: u64 = 1_000_000;

/// Derives a canonical handle from an `(email, name)` pair.
pub struct Normalizer {
    mention: Regex,
    numeric_noreply: Regex,
    handle_shaped: Regex,
    parenthesized: Regex,
    first_party_suffixes: Vec<String>,
}

impl Normalizer {
    pub fn new(noreply_host: &str) -> Result<Self> {
        let host = noreply_host.to_lowercase();

        Ok(Self {
            mention: Regex::new(r"(?:^|[^A-Za-z0-9._%+-])@([A-Za-z0-9][A-Za-z0-9-]*)")
                .context("Failed to compile mention pattern")?,
            numeric_noreply: Regex::new(&format!(
                r"(?i)^\d+\+([A-Za-z0-9-]+)@users\.noreply\.{}$",
                regex::escape(&host)
            ))
            .context("Failed to compile no-reply pattern")?,
            handle_shaped: Regex::new(r"^[A-Za-z0-9-]{3,39}$")
                .context("Failed to compile handle pattern")?,
            parenthesized: Regex::new(r"\(\s*@?([A-Za-z0-9][A-Za-z0-9-]*)\s*\)")
                .context("Failed to compile parenthesized handle pattern")?,
            first_party_suffixes: vec![format!("@users.noreply.{host}"), format!("@{host}")],
        })
    }

    /// First rule that yields a non-empty handle wins. `None` only when both
    /// inputs are blank.
    pub fn normalize(&self, email: &str, name: &str) -> Option<String> {
        let email = email.trim();
        let name = name.trim();

        if email.is_empty() && name.is_empty() {
            return None;
        }

        let lower_email = email.to_lowercase();
        let local_part = email.split('@').next().unwrap_or_default();
        let seed = if email.is_empty() { name } else { lower_email.as_str() };

        let handle = self
            .mentioned_handle(name)
            .or_else(|| self.numeric_noreply_handle(email))
            .or_else(|| plus_segment(local_part))
            .or_else(|| self.first_party_handle(&lower_email, local_part))
            .or_else(|| self.handle_shaped.is_match(name).then(|| name.to_string()))
            .or_else(|| self.parenthesized_handle(name))
            .or_else(|| plain_local_part(local_part))
            .or_else(|| first_name_token(name))
            .or_else(|| non_empty(name_token(name)))
            .unwrap_or_else(|| fallback_handle(seed));

        Some(handle)
    }

    fn is_first_party(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.first_party_suffixes.iter().any(|s| email.ends_with(s))
    }

    fn mentioned_handle(&self, name: &str) -> Option<String> {
        let caps = self.mention.captures(name)?;
        non_empty(caps.get(1)?.as_str().trim_end_matches('-').to_string())
    }

    fn numeric_noreply_handle(&self, email: &str) -> Option<String> {
        let caps = self.numeric_noreply.captures(email)?;
        non_empty(caps.get(1)?.as_str().to_string())
    }

    fn first_party_handle(&self, lower_email: &str, local_part: &str) -> Option<String> {
        if !self.is_first_party(lower_email) {
            return None;
        }
        non_empty(local_part.to_string())
    }

    fn parenthesized_handle(&self, name: &str) -> Option<String> {
        let caps = self.parenthesized.captures(name)?;
        non_empty(caps.get(1)?.as_str().to_string())
    }
}

/// Lowercase alphanumerics only, e.g. `"Jane O'Neil"` -> `"janeoneil"`.
pub fn name_token(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a login was produced by [`fallback_handle`].
pub fn is_synthetic(login: &str) -> bool {
    login
        .strip_prefix(FALLBACK_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

// Mangled addresses such as `123+name@...` forwarded through another service.
fn plus_segment(local_part: &str) -> Option<String> {
    let (_, segment) = local_part.rsplit_once('+')?;
    (segment.len() > 2).then(|| segment.to_string())
}

fn plain_local_part(local_part: &str) -> Option<String> {
    if local_part.len() <= 2 || local_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(local_part.to_string())
}

fn first_name_token(name: &str) -> Option<String> {
    let token = name_token(name.split_whitespace().next()?);
    (token.chars().count() > 2).then_some(token)
}

fn fallback_handle(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("{FALLBACK_PREFIX}{}", u64::from_be_bytes(prefix) % FALLBACK_SPACE)
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}
