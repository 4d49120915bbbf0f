//! Dead-letter sinks for permanently failed objects.
//!
//! A record is written before the notification is acknowledged; if the write
//! fails the notification is left for redelivery instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

use crate::error::DeadLetterError;
use crate::output::{OutputFormat, OutputWriter};
use crate::types::{OutcomeReport, ProcessingOutcome};

/// Why an object was dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// No redelivery could succeed (missing source, undecodable, encoder failure)
    Permanent,
    /// Retryable failures persisted through the last allowed attempt
    AttemptsExhausted,
}

/// One permanently failed object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    #[serde(flatten)]
    pub outcome: OutcomeReport,
    pub attempt: u32,
    pub reason: DeadLetterReason,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    pub fn new(outcome: &ProcessingOutcome, attempt: u32, reason: DeadLetterReason) -> Self {
        Self {
            outcome: OutcomeReport::from(outcome),
            attempt,
            reason,
            failed_at: Utc::now(),
        }
    }
}

/// Destination for dead-letter records.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    fn name(&self) -> &str;

    /// Durably record a permanently failed object.
    async fn record(&self, record: &DeadLetterRecord) -> Result<(), DeadLetterError>;
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryDeadLetter {
    records: Mutex<Vec<DeadLetterRecord>>,
}

impl MemoryDeadLetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DeadLetterRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetter {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record(&self, record: &DeadLetterRecord) -> Result<(), DeadLetterError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonlDeadLetter {
    path: PathBuf,
    // Serializes appends so concurrent workers never interleave lines
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlDeadLetter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeadLetterSink for JsonlDeadLetter {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn record(&self, record: &DeadLetterRecord) -> Result<(), DeadLetterError> {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::JsonLines);
        writer.record(record)?;
        let line = writer.into_inner();

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
