use super::HistoryEntry;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Reads the stored series. A missing or unreadable file starts a new one.
pub fn load(path: &Path) -> Vec<HistoryEntry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No history at {}, starting a new series", path.display());
            return Vec::new();
        }
        Err(e) => {
            warn!("Could not read {}: {}; starting a new series", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Corrupt history in {}: {}; starting a new series", path.display(), e);
            Vec::new()
        }
    }
}

/// Appends `entry`, dropping the oldest entries beyond `limit`.
pub fn append(mut entries: Vec<HistoryEntry>, entry: HistoryEntry, limit: usize) -> Vec<HistoryEntry> {
    entries.push(entry);
    if entries.len() > limit {
        let excess = entries.len() - limit;
        entries.drain(..excess);
    }
    entries
}

pub fn render(entries: &[HistoryEntry]) -> Result<String> {
    serde_json::to_string_pretty(entries).context("Failed to serialize history")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(day: u32, stars: u64) -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, 6, 0, 0).unwrap(),
            repos: 4,
            stars,
            forks: 1,
            contributors: 9,
            commits: 120,
            lines_of_code: 4_000,
        }
    }

    #[test]
    fn append_drops_oldest_first() {
        let mut entries = Vec::new();
        for day in 1..=4 {
            entries = append(entries, entry(day, day as u64 * 10), 3);
        }

        let stars: Vec<_> = entries.iter().map(|e| e.stars).collect();
        assert_eq!(stars, vec![20, 30, 40]);
    }

    #[test]
    fn missing_and_corrupt_files_start_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        assert!(load(&path).is_empty());

        fs::write(&path, "{ not json").unwrap();
        assert!(load(&path).is_empty());

        fs::write(&path, render(&[entry(2, 5)]).unwrap()).unwrap();
        assert_eq!(load(&path), vec![entry(2, 5)]);
    }
}
