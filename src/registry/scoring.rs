//! Picks which record survives when a match-set is merged.

use super::ContributorRecord;
use crate::identity::normalizer::is_synthetic;

pub const FIRST_PARTY_AVATAR_HOST: &str = "avatars.githubusercontent.com";

pub fn score(record: &ContributorRecord) -> f64 {
    let mut score = 0.1 * record.contributions as f64;

    if let Some(handle) = &record.verified_handle {
        score += 100.0;
        if handle.eq_ignore_ascii_case(&record.display_login) {
            score += 50.0;
        }
    }

    if record
        .avatar_url
        .as_deref()
        .and_then(url_host)
        .is_some_and(|host| host.eq_ignore_ascii_case(FIRST_PARTY_AVATAR_HOST))
    {
        score += 30.0;
    }

    if !is_synthetic(&record.canonical_login) {
        score += 20.0;
    }

    if !record.display_login.chars().any(char::is_whitespace) {
        score += 5.0;
    }

    score
}

/// Index of the highest scoring member; the earliest member wins ties.
pub fn select_primary(members: &[&ContributorRecord]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, member) in members.iter().enumerate() {
        let s = score(member);
        match best {
            Some((_, top)) if s <= top => {}
            _ => best = Some((i, s)),
        }
    }

    best.map(|(i, _)| i)
}

fn url_host(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn record(login: &str, contributions: u64) -> ContributorRecord {
        ContributorRecord {
            canonical_login: login.to_lowercase(),
            display_login: login.to_string(),
            name: None,
            email: None,
            avatar_url: None,
            profile_url: None,
            contributions,
            repositories: BTreeSet::new(),
            verified_handle: None,
            aliases: Vec::new(),
            pending_resolution: false,
        }
    }

    #[test]
    fn heuristic_record_scores_contributions_and_shape() {
        let r = record("alice", 30);
        assert!((score(&r) - 28.0).abs() < 1e-9);

        let synthetic = record("contributor-4821", 30);
        assert!((score(&synthetic) - 8.0).abs() < 1e-9);

        let spaced = record("Alice Smith", 0);
        assert!((score(&spaced) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn verified_matching_login_with_first_party_avatar_scores_highest() {
        let mut r = record("Octocat", 0);
        r.verified_handle = Some("octocat".to_string());
        r.avatar_url = Some("https://avatars.githubusercontent.com/u/583231?v=4".to_string());
        assert!((score(&r) - 205.0).abs() < 1e-9);
    }

    #[test]
    fn avatar_host_must_match_exactly() {
        let mut r = record("mallory", 0);
        r.avatar_url = Some("https://avatars.githubusercontent.com.evil.example/x".to_string());
        assert!((score(&r) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn verification_outweighs_contribution_volume() {
        let busy = record("alice", 900);
        let mut verified = record("alice-work", 1);
        verified.verified_handle = Some("alice-gh".to_string());

        assert_eq!(select_primary(&[&busy, &verified]), Some(1));
    }

    #[test]
    fn ties_go_to_first_member() {
        let a = record("alpha", 5);
        let b = record("bravo", 5);
        assert_eq!(select_primary(&[&a, &b]), Some(0));
        assert_eq!(select_primary(&[&b, &a]), Some(0));
        assert_eq!(select_primary(&[]), None);
    }
}
