use super::*;
use anyhow::{Context, Result};
use fancy_regex::Regex as FancyRegex;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Marker synonyms accepted in front of an attribution.
const MARKERS: &str = r"co-?authored[- ]?by|co-?authors?|credits?|signed-off-by|author|with";

/// Heuristics in the order they run. Later entries overlap earlier ones on
/// purpose so a hand-written message that defeats one pattern is still caught.
const HEURISTICS: [Heuristic; 5] = [
    Heuristic::TrailerLine,
    Heuristic::InlineTrailer,
    Heuristic::MarkerSweep,
    Heuristic::Mention,
    Heuristic::BareEmail,
];

pub struct CoAuthorExtractor {
    heuristics: Vec<Heuristic>,
    trailer_line: Regex,
    inline_marker: Regex,
    inline_segment: Regex,
    marker_sweep: FancyRegex,
    mention: FancyRegex,
    bare_email: Regex,
    noreply_domain: String,
}

impl CoAuthorExtractor {
    pub fn new(strictness: Strictness, noreply_host: &str) -> Result<Self> {
        let heuristics: Vec<_> = HEURISTICS
            .into_iter()
            .filter(|h| strictness.allows(*h))
            .collect();

        debug!(
            "Co-author extraction running {} heuristics ({:?})",
            heuristics.len(),
            strictness
        );

        Ok(Self {
            heuristics,
            trailer_line: Regex::new(&format!(
                r"(?i)^(?:{MARKERS})\s*:\s*([^<]*?)\s*<([^<>\s]+@[^<>\s]+)>"
            ))
            .context("Failed to compile trailer line pattern")?,
            inline_marker: Regex::new(r"(?i)co-?authored[- ]?by\s*:")
                .context("Failed to compile inline marker pattern")?,
            inline_segment: Regex::new(r"^\s*([^<]*?)\s*<([^<>\s]+@[^<>\s]+)>")
                .context("Failed to compile inline segment pattern")?,
            marker_sweep: FancyRegex::new(&format!(
                r"(?i)(?<![\w-])(?:{MARKERS})\s*:[ \t]*([^<>\n@]*?)[ \t]*<?([\w.+-]+@[\w-]+(?:\.[\w-]+)+)>?"
            ))
            .context("Failed to compile marker sweep pattern")?,
            mention: FancyRegex::new(r#"(?<![^\s(,;:"'])@([A-Za-z0-9-]{3,})"#)
                .context("Failed to compile mention pattern")?,
            bare_email: Regex::new(
                r"[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}",
            )
            .context("Failed to compile email pattern")?,
            noreply_domain: format!("users.noreply.{}", noreply_host.to_lowercase()),
        })
    }

    /// Every distinct (by email, case-insensitive) identity attributed in a
    /// commit message, in first-seen order. Never fails: unparseable markers are
    /// skipped.
    pub fn extract(&self, message: &str) -> Vec<CandidateIdentity> {
        let message = message.replace("\r\n", "\n").replace('\r', "\n");

        let mut found = Vec::new();
        for heuristic in &self.heuristics {
            match heuristic {
                Heuristic::TrailerLine => self.scan_trailer_lines(&message, &mut found),
                Heuristic::InlineTrailer => self.scan_inline_trailers(&message, &mut found),
                Heuristic::MarkerSweep => self.sweep_markers(&message, &mut found),
                Heuristic::Mention => self.scan_mentions(&message, &mut found),
                Heuristic::BareEmail => self.scan_bare_emails(&message, &mut found),
                Heuristic::CommitAuthor => {}
            }
        }

        let mut seen = HashSet::new();
        found.retain(|c| match c.email_key() {
            Some(key) => seen.insert(key),
            None => false,
        });
        found
    }

    fn scan_trailer_lines(&self, message: &str, out: &mut Vec<CandidateIdentity>) {
        for line in message.lines().map(str::trim) {
            if let Some(caps) = self.trailer_line.captures(line) {
                out.push(CandidateIdentity::new(
                    caps.get(1).map(|m| m.as_str()),
                    caps.get(2).map(|m| m.as_str()),
                    Heuristic::TrailerLine,
                ));
            }
        }
    }

    // Several trailers glued onto one line: each segment runs from the end of
    // one marker to the start of the next.
    fn scan_inline_trailers(&self, message: &str, out: &mut Vec<CandidateIdentity>) {
        let markers: Vec<_> = self.inline_marker.find_iter(message).collect();

        for (i, marker) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map_or(message.len(), |next| next.start());
            let segment = &message[marker.end()..end];

            if let Some(caps) = self.inline_segment.captures(segment) {
                out.push(CandidateIdentity::new(
                    caps.get(1).map(|m| m.as_str()),
                    caps.get(2).map(|m| m.as_str()),
                    Heuristic::InlineTrailer,
                ));
            }
        }
    }

    fn sweep_markers(&self, message: &str, out: &mut Vec<CandidateIdentity>) {
        for caps in self.marker_sweep.captures_iter(message) {
            let Ok(caps) = caps else {
                // Backtrack limit hit; the remaining heuristics still run.
                debug!("Marker sweep aborted on a pathological message");
                break;
            };
            out.push(CandidateIdentity::new(
                caps.get(1).map(|m| m.as_str()),
                caps.get(2).map(|m| m.as_str()),
                Heuristic::MarkerSweep,
            ));
        }
    }

    fn scan_mentions(&self, message: &str, out: &mut Vec<CandidateIdentity>) {
        for caps in self.mention.captures_iter(message) {
            let Ok(caps) = caps else {
                debug!("Mention scan aborted on a pathological message");
                break;
            };
            let Some(handle) = caps.get(1).map(|m| m.as_str().trim_matches('-')) else {
                continue;
            };
            if handle.len() < 3 {
                continue;
            }

            let email = format!("{}@{}", handle, self.noreply_domain);
            out.push(CandidateIdentity::new(
                Some(handle),
                Some(&email),
                Heuristic::Mention,
            ));
        }
    }

    // Tails of addresses already captured are not new identities.
    fn scan_bare_emails(&self, message: &str, out: &mut Vec<CandidateIdentity>) {
        let captured: Vec<String> = out.iter().filter_map(CandidateIdentity::email_key).collect();

        for m in self.bare_email.find_iter(message) {
            let email = m.as_str().trim_start_matches('\'');
            let key = email.to_lowercase();
            if captured.iter().any(|c| *c != key && c.ends_with(&key)) {
                continue;
            }
            out.push(CandidateIdentity::new(None, Some(email), Heuristic::BareEmail));
        }
    }
}
