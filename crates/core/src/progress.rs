use crate::worker::WorkerState;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Receives progress from a worker. Calls arrive synchronously on the worker
/// thread; implementations marshal to their own thread if needed.
///
/// All methods have default no-op implementations.
pub trait ProgressSink: Send + Sync {
    /// A new unit of work started: `current` is 1-based.
    fn on_progress(&self, _current: usize, _total: usize, _path: &Path) {}
    /// Progress within the current unit, `percent` in 0..=100.
    fn on_sub_progress(&self, _message: &str, _percent: u8) {}
    fn on_state(&self, _state: WorkerState) {}
}

/// No-op sink for silent operation.
pub struct SilentSink;

impl ProgressSink for SilentSink {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Overall {
        current: usize,
        total: usize,
        path: PathBuf,
    },
    Sub {
        message: String,
        percent: u8,
    },
    State(WorkerState),
}

/// Forwards progress into a tokio channel. `send` never blocks, so the worker
/// thread is not held up by a slow consumer.
#[derive(Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: ProgressEvent) {
        // Receiver dropped: nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, current: usize, total: usize, path: &Path) {
        self.send(ProgressEvent::Overall {
            current,
            total,
            path: path.to_path_buf(),
        });
    }

    fn on_sub_progress(&self, message: &str, percent: u8) {
        self.send(ProgressEvent::Sub {
            message: message.to_string(),
            percent: percent.min(100),
        });
    }

    fn on_state(&self, state: WorkerState) {
        self.send(ProgressEvent::State(state));
    }
}

/// Cooperative cancellation flag shared between a worker and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
