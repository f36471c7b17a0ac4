use crate::github::LanguageBytes;
use std::collections::BTreeMap;

const DEFAULT_BYTES_PER_LINE: u64 = 40;

/// Rough average source line width per language.
fn bytes_per_line(language: &str) -> u64 {
    match language {
        "C" | "C++" | "Objective-C" => 32,
        "Go" | "Rust" | "Java" | "Kotlin" | "Scala" | "Swift" | "C#" => 35,
        "Python" | "Ruby" | "Shell" | "Perl" | "Lua" => 30,
        "JavaScript" | "TypeScript" | "Vue" | "Svelte" => 38,
        "HTML" | "CSS" | "SCSS" | "XML" => 50,
        "Jupyter Notebook" => 120,
        _ => DEFAULT_BYTES_PER_LINE,
    }
}

pub fn estimate_lines(language: &str, bytes: u64) -> u64 {
    bytes / bytes_per_line(language)
}

/// Estimated lines of code per language.
pub fn lines_by_language(bytes: &LanguageBytes) -> BTreeMap<String, u64> {
    bytes
        .iter()
        .map(|(language, bytes)| (language.clone(), estimate_lines(language, *bytes)))
        .collect()
}
