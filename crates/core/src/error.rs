use automation::AutomationError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a whole batch. Per-file problems never surface here.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("document automation is not available: {0}")]
    AutomationUnavailable(#[source] AutomationError),
    #[error("cannot start discovery: {0}")]
    Discovery(String),
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot create archive folder {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("archive manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
