use serde::{Deserialize, Serialize};

pub mod extractor;
pub mod normalizer;

pub use extractor::CoAuthorExtractor;
pub use normalizer::Normalizer;

/// An identity spotted in commit data, consumed immediately by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
    pub source: Heuristic,
}

impl CandidateIdentity {
    pub fn new(name: Option<&str>, email: Option<&str>, source: Heuristic) -> Self {
        let clean = |s: &str| {
            let s = s.trim().trim_matches(|c| c == '"' || c == '\'').trim();
            (!s.is_empty()).then(|| s.to_string())
        };

        Self {
            name: name.and_then(clean),
            email: email.and_then(clean),
            source,
        }
    }

    pub fn email_key(&self) -> Option<String> {
        self.email.as_ref().map(|e| e.to_lowercase())
    }
}

/// Which rule produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    TrailerLine,
    InlineTrailer,
    MarkerSweep,
    Mention,
    BareEmail,
    CommitAuthor,
}

/// How many of the extraction heuristics run. Looser settings catch more real
/// co-authors at the price of false positives such as `@mentions` in prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Trailer line and inline trailer scans only.
    Strict,
    /// Everything except the `@mention` scan.
    Standard,
    /// Every heuristic.
    #[default]
    Lenient,
}

impl Strictness {
    pub fn allows(self, heuristic: Heuristic) -> bool {
        match self {
            Strictness::Lenient => true,
            Strictness::Standard => heuristic != Heuristic::Mention,
            Strictness::Strict => matches!(
                heuristic,
                Heuristic::TrailerLine | Heuristic::InlineTrailer | Heuristic::CommitAuthor
            ),
        }
    }
}
