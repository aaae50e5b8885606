//! Structured events emitted by the pipeline components.
//!
//! Components never call the logging macros for their outcomes directly;
//! they report a [`BackupEvent`] to an injected [`EventSink`]. The binary
//! uses [`LogSink`], which forwards to the `log` facade, while tests and
//! embedding callers can use [`MemorySink`] to inspect what happened.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use log::Level;

use crate::pipeline::PipelineStage;

/// Result of a single upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    /// Failed but another attempt follows after `retry_in`.
    Retrying { reason: String, retry_in: Duration },
    /// Failed and no further attempt will be made.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupEvent {
    DirectorySkipped {
        path: PathBuf,
        reason: String,
    },
    ArchiveCreated {
        path: PathBuf,
        entries: usize,
        size: u64,
        sha256: String,
    },
    ArchiveFailed {
        reason: String,
    },
    ArtifactStaged {
        path: PathBuf,
    },
    UploadAttempt {
        key: String,
        attempt: u32,
        max_attempts: u32,
        outcome: AttemptOutcome,
        latency: Duration,
    },
    PipelineFailed {
        stage: PipelineStage,
        kind: &'static str,
        reason: String,
    },
    PipelineCompleted {
        key: String,
        bucket: String,
    },
    PipelineCancelled {
        before: PipelineStage,
    },
}

impl BackupEvent {
    pub fn level(&self) -> Level {
        match self {
            BackupEvent::DirectorySkipped { .. } | BackupEvent::PipelineCancelled { .. } => {
                Level::Warn
            }
            BackupEvent::ArchiveFailed { .. } | BackupEvent::PipelineFailed { .. } => Level::Error,
            BackupEvent::UploadAttempt { outcome, .. } => match outcome {
                AttemptOutcome::Succeeded => Level::Info,
                AttemptOutcome::Retrying { .. } => Level::Warn,
                AttemptOutcome::Failed { .. } => Level::Error,
            },
            _ => Level::Info,
        }
    }
}

impl fmt::Display for BackupEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupEvent::DirectorySkipped { path, reason } => {
                write!(f, "Directory {} skipped: {}", path.display(), reason)
            }
            BackupEvent::ArchiveCreated {
                path,
                entries,
                size,
                sha256,
            } => write!(
                f,
                "Archive created: {} ({} entries, {} bytes, sha256 {})",
                path.display(),
                entries,
                size,
                sha256
            ),
            BackupEvent::ArchiveFailed { reason } => write!(f, "Archive creation failed: {}", reason),
            BackupEvent::ArtifactStaged { path } => write!(f, "Backup created: {}", path.display()),
            BackupEvent::UploadAttempt {
                key,
                attempt,
                max_attempts,
                outcome,
                latency,
            } => {
                write!(f, "Upload of {} attempt {}/{} ", key, attempt, max_attempts)?;
                match outcome {
                    AttemptOutcome::Succeeded => write!(f, "succeeded in {:?}", latency),
                    AttemptOutcome::Retrying { reason, retry_in } => write!(
                        f,
                        "failed after {:?}, retrying in {:?}: {}",
                        latency, retry_in, reason
                    ),
                    AttemptOutcome::Failed { reason } => {
                        write!(f, "failed after {:?}: {}", latency, reason)
                    }
                }
            }
            BackupEvent::PipelineFailed {
                stage,
                kind,
                reason,
            } => write!(f, "Backup failed during {} ({}): {}", stage, kind, reason),
            BackupEvent::PipelineCompleted { key, bucket } => {
                write!(f, "Backup uploaded to s3://{}/{}", bucket, key)
            }
            BackupEvent::PipelineCancelled { before } => {
                write!(f, "Backup cancelled before {}", before)
            }
        }
    }
}

/// Receiver for pipeline events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BackupEvent);
}

/// Forwards events to the `log` facade at their own level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: BackupEvent) {
        log::log!(event.level(), "{}", event);
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<BackupEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BackupEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Upload attempt events only.
    pub fn upload_attempts(&self) -> Vec<BackupEvent> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, BackupEvent::UploadAttempt { .. }))
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: BackupEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
