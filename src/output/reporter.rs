use super::*;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

const SNAPSHOT_FILE: &str = "snapshot.json";
const HISTORY_FILE: &str = "history.json";

pub struct Reporter {
    dir: PathBuf,
    history_limit: usize,
}

impl Reporter {
    pub fn new(dir: impl AsRef<Path>, history_limit: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        Ok(Self {
            dir,
            history_limit: history_limit.max(1),
        })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    /// Writes the snapshot and the updated history. Both are staged as temp
    /// files first; history is renamed into place before the snapshot, so a
    /// failure leaves the previous snapshot in place. Returns the new history
    /// length.
    pub fn write(&self, snapshot: &Snapshot) -> Result<usize> {
        let snapshot_json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;

        let entries = history::append(
            history::load(&self.history_path()),
            HistoryEntry::from(snapshot),
            self.history_limit,
        );
        let history_json = history::render(&entries)?;

        let staged_history = self.stage(&self.history_path(), &history_json)?;
        let staged_snapshot = self.stage(&self.snapshot_path(), &snapshot_json)?;
        persist(staged_history, &self.history_path())?;
        persist(staged_snapshot, &self.snapshot_path())?;

        info!(
            "Snapshot saved to {} ({} history entries)",
            self.snapshot_path().display(),
            entries.len()
        );
        Ok(entries.len())
    }

    // Same directory as the target so the final rename stays on one filesystem.
    fn stage(&self, path: &Path, content: &str) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {}", self.dir.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(file)
    }
}

fn persist(file: NamedTempFile, path: &Path) -> Result<()> {
    file.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
