// # Append-Only Log Store
//
// Durable, ever-growing text log of timestamped records.
//
// ## Write discipline
//
// Every append opens the file in append mode, writes the complete record in
// a single `write_all`, and drops the handle. Append-mode writes of one
// buffer are atomic from the OS's perspective, so concurrent writers
// (multiple timer callbacks, or a second process) never interleave partial
// lines. No handle is held between writes.
//
// ## Record format
//
// One record per line: `"<RFC 3339 timestamp> <message>\n"`. Append order
// is chronological order; records are immutable once written.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::Error;

/// Append-only store of timestamped log records
///
/// The monitor keeps two instances: the event log and the error log.
/// Cloning is cheap; instances bound to the same path share the file.
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    /// Bind a store to a log file path (the file is created lazily)
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record stamped with the current time
    ///
    /// Returns the full line as written (without the trailing newline) so
    /// callers that persist line identities — the shipping watermark — see
    /// the verbatim content.
    pub async fn append(&self, message: &str) -> Result<String, Error> {
        self.append_at(message, Utc::now()).await
    }

    /// Append one record with an explicit timestamp
    pub async fn append_at(&self, message: &str, at: DateTime<Utc>) -> Result<String, Error> {
        let record = Self::format_record(message, at);
        self.write_block(&record).await?;
        Ok(record.trim_end_matches('\n').to_string())
    }

    /// Append several records in one write, all with the same timestamp
    ///
    /// Used for the connection-service trio: a single write means no reader
    /// or concurrent writer can observe half of the transition.
    pub async fn append_all_at(&self, messages: &[String], at: DateTime<Utc>) -> Result<(), Error> {
        if messages.is_empty() {
            return Ok(());
        }
        let block: String = messages
            .iter()
            .map(|m| Self::format_record(m, at))
            .collect();
        self.write_block(&block).await
    }

    /// Entire file content; creates the file with empty content if absent
    pub async fn read_all(&self) -> Result<String, Error> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.ensure_exists().await?;
                Ok(String::new())
            }
            Err(e) => Err(Error::persistence(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Last `n` non-empty lines, in original order
    pub async fn tail_lines(&self, n: usize) -> Result<Vec<String>, Error> {
        let content = self.read_all().await?;
        let mut lines: Vec<String> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();
        if lines.len() > n {
            lines.drain(..lines.len() - n);
        }
        Ok(lines)
    }

    /// Create the file with empty content if it does not exist
    pub async fn ensure_exists(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::persistence(format!(
                    "failed to create log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                Error::persistence(format!("failed to create {}: {}", self.path.display(), e))
            })?;
        Ok(())
    }

    fn format_record(message: &str, at: DateTime<Utc>) -> String {
        format!(
            "{} {}\n",
            at.to_rfc3339_opts(SecondsFormat::Millis, true),
            message
        )
    }

    async fn write_block(&self, block: &str) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::persistence(format!(
                    "failed to create log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                Error::persistence(format!(
                    "failed to open {} for append: {}",
                    self.path.display(),
                    e
                ))
            })?;

        file.write_all(block.as_bytes()).await.map_err(|e| {
            Error::persistence(format!("failed to append to {}: {}", self.path.display(), e))
        })?;

        file.flush().await.map_err(|e| {
            Error::persistence(format!("failed to flush {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }
}
