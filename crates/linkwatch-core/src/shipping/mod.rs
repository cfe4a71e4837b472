//! Log shipping with a persisted watermark
//!
//! Tracks which log lines have already been uploaded, persists that mark
//! across restarts, and computes the exact delta to send on each attempt.
//!
//! ## Watermark semantics
//!
//! The watermark is the verbatim content of the last log line the endpoint
//! confirmed. It always refers to a line that exists in the log, or is
//! unset (nothing shipped yet). It advances only after a confirmed
//! delivery, so a crashed or failed attempt re-sends the same suffix rather
//! than losing it.
//!
//! ## Ordering
//!
//! A successful attempt is itself logged as a record, and the watermark is
//! then parked on that success record. The marker is thereby excluded from
//! its own future delta computation; the alternative — watermark on the
//! last delta line — would re-ship a fresh success marker every cycle.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::SeverityThresholds;
use crate::error::Error;
use crate::logstore::LogStore;
use crate::render::render_html;
use crate::traits::{ShipmentBatch, ShipmentSink};

/// Persisted last-shipped-line marker
///
/// A single-line file holding the verbatim line; replaced atomically on
/// every advance.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    /// Bind a store to the watermark path (created on first advance)
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current watermark; `None` when absent or empty (nothing shipped)
    pub async fn load(&self) -> Result<Option<String>, Error> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                let line = content.trim_end_matches(['\r', '\n']).to_string();
                Ok(if line.is_empty() { None } else { Some(line) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::persistence(format!(
                "failed to read watermark {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Advance the watermark to `line` (atomic replace)
    pub async fn store(&self, line: &str) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::persistence(format!(
                    "failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = {
            let mut temp = self.path.clone();
            temp.set_extension("tmp");
            temp
        };
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persistence(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(line.as_bytes()).await.map_err(|e| {
                Error::persistence(format!(
                    "failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.flush().await.map_err(|e| {
                Error::persistence(format!(
                    "failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::persistence(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

/// The ordered slice of `tail` strictly after the watermark line
///
/// Scans from the end backward for a line equal to the watermark. A
/// watermark that rotated out of the window returns the whole tail — fail
/// open: re-sending a bounded window beats silently dropping history. An
/// unset watermark also returns the whole tail.
pub fn compute_delta(tail: &[String], watermark: Option<&str>) -> Vec<String> {
    let Some(watermark) = watermark else {
        return tail.to_vec();
    };
    match tail.iter().rposition(|line| line == watermark) {
        Some(pos) => tail[pos + 1..].to_vec(),
        None => tail.to_vec(),
    }
}

/// Outcome of one shipping attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipOutcome {
    /// Nothing new since the watermark; no network call was made
    NothingToShip,
    /// The endpoint confirmed this many lines
    Shipped(usize),
}

/// Orchestrates one shipping attempt end to end
pub struct Shipper {
    log: LogStore,
    watermark: WatermarkStore,
    sink: Box<dyn ShipmentSink>,
    tail_window: usize,
    thresholds: SeverityThresholds,
}

impl Shipper {
    /// Create a shipper over the given stores and sink
    pub fn new(
        log: LogStore,
        watermark: WatermarkStore,
        sink: Box<dyn ShipmentSink>,
        tail_window: usize,
        thresholds: SeverityThresholds,
    ) -> Self {
        Self {
            log,
            watermark,
            sink,
            tail_window,
            thresholds,
        }
    }

    /// Run one complete attempt: read tail, compute delta, ship, advance
    ///
    /// An empty delta skips the network call entirely and leaves the
    /// watermark unchanged. On a sink error the watermark is untouched, so
    /// the next attempt recomputes a delta that still contains the
    /// unshipped lines.
    pub async fn run_once(&self) -> Result<ShipOutcome, Error> {
        let tail = self.log.tail_lines(self.tail_window).await?;
        let watermark = self.watermark.load().await?;
        let delta = compute_delta(&tail, watermark.as_deref());

        if delta.is_empty() {
            debug!("no new log lines to ship");
            return Ok(ShipOutcome::NothingToShip);
        }

        let batch = ShipmentBatch::new(&delta, render_html(&delta, &self.thresholds));
        self.sink.ship(&batch).await?;

        let shipped = delta.len();

        // Log the success, then park the watermark on the success record
        // itself. That both advances past the delta and keeps the marker
        // out of its own future delta — a watermark on the last delta line
        // would ship a fresh "LOGS SHIPPED" record every cycle, forever.
        let success_line = self
            .log
            .append_at(&format!("LOGS SHIPPED ({} lines)", shipped), Utc::now())
            .await?;
        self.watermark.store(&success_line).await?;

        info!(lines = shipped, "shipped log delta");
        Ok(ShipOutcome::Shipped(shipped))
    }
}
