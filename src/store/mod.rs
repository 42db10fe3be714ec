//! Durable record store
//!
//! Three append-only artifacts live under the data directory: the tabular
//! CSV record store (one row per invocation), raw trial payloads (one JSON
//! file per successful run, keyed by the record timestamp), and the
//! JSON-lines error journal. Files are opened, appended, and closed within
//! a single invocation; readers (the dashboard) only ever see appended
//! growth.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::models::record::{MeasurementRecord, CSV_HEADER};
use crate::models::JournalEntry;

/// Append-only CSV store plus the raw payload directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    csv_path: PathBuf,
    raw_dir: PathBuf,
}

impl RecordStore {
    pub fn new(config: &Config) -> Self {
        Self {
            csv_path: config.csv_path(),
            raw_dir: config.raw_dir(),
        }
    }

    pub fn at(csv_path: PathBuf, raw_dir: PathBuf) -> Self {
        Self { csv_path, raw_dir }
    }

    /// Ensure the CSV file exists and starts with the expected header.
    ///
    /// A missing file is created with the header. A file whose first line is
    /// not the header is rewritten as header + surviving data rows; stray
    /// header lines inside the body are dropped.
    pub fn ensure_header(&self) -> Result<()> {
        if let Some(parent) = self.csv_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if !self.csv_path.exists() {
            fs::write(&self.csv_path, format!("{CSV_HEADER}\n"))?;
            return Ok(());
        }

        let content = fs::read_to_string(&self.csv_path)?;
        let mut lines = content.lines();
        if lines.next() == Some(CSV_HEADER) {
            return Ok(());
        }

        tracing::info!(path = %self.csv_path.display(), "repairing record store header");
        let mut repaired = String::with_capacity(content.len() + CSV_HEADER.len() + 1);
        repaired.push_str(CSV_HEADER);
        repaired.push('\n');
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("timestamp") {
                continue;
            }
            repaired.push_str(line);
            repaired.push('\n');
        }
        fs::write(&self.csv_path, repaired)?;
        Ok(())
    }

    /// Append one record row, ensuring the header first.
    pub fn append(&self, record: &MeasurementRecord) -> Result<()> {
        self.ensure_header()?;
        append_line(&self.csv_path, &record.to_csv_row())
    }

    /// Persist the verbatim payload of a successful trial under the
    /// timestamp-derived key. Returns the written path.
    pub fn write_raw_payload(&self, key: &str, payload: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.raw_dir)?;
        let path = self.raw_dir.join(key);
        fs::write(&path, payload)?;
        Ok(path)
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

/// Append-only JSON-lines error journal.
#[derive(Debug, Clone)]
pub struct ErrorJournal {
    path: PathBuf,
}

impl ErrorJournal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one entry. Also mirrored to tracing so the scheduler's log
    /// collector sees the same event.
    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        let line = entry.to_json_line();
        tracing::warn!(phase = ?entry.phase, reason = %entry.reason, "journaled failure");
        append_line(&self.path, &line)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}
