//! Per-request audit log.
//!
//! One JSONL line per handled request, mirrored in a bounded in-memory ring
//! buffer. Internal failure causes land here (in `detail`) instead of in the
//! response body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const MAX_LOG_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub outcome: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Number of contents forwarded upstream.
    pub contents: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn new(request_id: Uuid, outcome: impl Into<String>, status: u16) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id,
            outcome: outcome.into(),
            status,
            model: None,
            contents: 0,
            elapsed_ms: 0,
            detail: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, contents: usize) -> Self {
        self.model = Some(model.into());
        self.contents = contents;
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    file_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl AuditLog {
    /// Open (or create) the log file, reloading the most recent entries.
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut entries = VecDeque::with_capacity(MAX_LOG_ENTRIES);

        if file_path.exists() {
            let reader = BufReader::new(File::open(&file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(entry) = serde_json::from_str::<AuditEntry>(&line) {
                    if entries.len() >= MAX_LOG_ENTRIES {
                        entries.pop_front();
                    }
                    entries.push_back(entry);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        Ok(Self {
            entries,
            file_path,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn record(&mut self, entry: AuditEntry) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(&entry) {
                if writeln!(writer, "{json}").and_then(|()| writer.flush()).is_err() {
                    tracing::warn!(path = %self.file_path.display(), "Failed to append audit entry");
                }
            }
        }
        if self.entries.len() >= MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Rewrite the file so it holds only the buffered entries.
    pub fn compact(&mut self) -> std::io::Result<()> {
        self.writer = None;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.file_path)?;
        let mut writer = BufWriter::new(file);
        for entry in &self.entries {
            if let Ok(json) = serde_json::to_string(entry) {
                writeln!(writer, "{json}")?;
            }
        }
        writer.flush()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }
}

#[derive(Clone)]
pub struct SharedLogger(Arc<Mutex<AuditLog>>);

impl SharedLogger {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(AuditLog::new(file_path)?))))
    }

    pub fn record(&self, entry: AuditEntry) {
        if let Ok(mut log) = self.0.lock() {
            log.record(entry);
        }
    }

    /// Record on the blocking pool so the file write and flush stay off the
    /// async worker. Completes once the entry is written.
    pub async fn record_async(&self, entry: AuditEntry) {
        let logger = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || logger.record(entry)).await {
            tracing::warn!(error = %e, "Audit write task failed");
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.0.lock().map(|l| l.recent(limit)).unwrap_or_default()
    }

    pub fn compact(&self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut log) => log.compact(),
            Err(_) => Err(std::io::Error::other("audit log lock poisoned")),
        }
    }
}
