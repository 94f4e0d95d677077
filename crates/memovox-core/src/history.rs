//! Local transcription history, persisted as a JSON file.
//!
//! A flat newest-first list with two policies: texts below a minimum word
//! count are rejected (returning `None` from [`HistoryStore::save`]), and
//! the list is capped, evicting the oldest records. Independent of the
//! session machine; callers decide whether a result is worth keeping.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Texts with fewer words than this are not worth keeping.
pub const MIN_WORDS: usize = 3;

/// Records beyond this cap are evicted, oldest first.
pub const MAX_RECORDS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Human-readable local time, for display.
    pub date: String,
}

pub struct HistoryStore {
    path: PathBuf,
    min_words: usize,
    max_records: usize,
}

impl HistoryStore {
    /// Open the store at the platform data directory
    /// (`<data_dir>/memovox/history.json`).
    pub fn open_default() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| {
                Error::Storage(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no data directory on this platform",
                ))
            })?
            .join("memovox");
        Ok(Self::at_path(dir.join("history.json")))
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_words: MIN_WORDS,
            max_records: MAX_RECORDS,
        }
    }

    /// Override the word-count and cap policies (mainly for tests).
    pub fn with_limits(mut self, min_words: usize, max_records: usize) -> Self {
        self.min_words = min_words;
        self.max_records = max_records;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a transcription, newest first.
    ///
    /// Returns `None` without touching the file when the text is below the
    /// minimum word count. When the cap is exceeded the oldest records are
    /// evicted.
    pub fn save(&self, text: &str) -> Result<Option<HistoryRecord>> {
        let word_count = text.split_whitespace().count();
        if word_count < self.min_words {
            crate::verbose!("history: skipping {word_count}-word transcription");
            return Ok(None);
        }

        let now = chrono::Local::now();
        let timestamp = now.timestamp_millis();

        let mut records = self.load();
        let record = HistoryRecord {
            id: unique_id(timestamp, &records),
            text: text.to_string(),
            timestamp,
            date: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        records.insert(0, record.clone());
        records.truncate(self.max_records);
        self.write(&records)?;

        Ok(Some(record))
    }

    /// All records, most recent first.
    pub fn list(&self) -> Vec<HistoryRecord> {
        self.load()
    }

    /// Remove one record. Returns whether anything was deleted.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.load();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write(&records)?;
        Ok(true)
    }

    /// Drop the whole history.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> Vec<HistoryRecord> {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                // A corrupt file should not brick the tool; start over.
                crate::verbose!("history: unreadable file, starting fresh: {e}");
                Vec::new()
            }
        }
    }

    fn write(&self, records: &[HistoryRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records).map_err(|e| {
            Error::Storage(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// `transcription-<millis>`, disambiguated when two saves land on the
/// same millisecond.
fn unique_id(timestamp: i64, existing: &[HistoryRecord]) -> String {
    let base = format!("transcription-{timestamp}");
    if !existing.iter().any(|r| r.id == base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}-{n}");
        if !existing.iter().any(|r| r.id == candidate) {
            return candidate;
        }
        n += 1;
    }
}
