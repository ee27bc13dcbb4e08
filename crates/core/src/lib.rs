//! Core library: discovery, conversion, archiving, batch orchestration and
//! image-to-PDF assembly.

pub mod archive;
pub mod config;
pub mod converter;
pub mod error;
pub mod images;
pub mod models;
pub mod progress;
pub mod scanner;
pub mod worker;

pub use automation::{DocumentFamily, TargetFormat};
pub use error::{ArchiveError, BatchError};
pub use progress::{CancelToken, ChannelSink, ProgressEvent, ProgressSink, SilentSink};
pub use worker::{BatchHandle, ConversionWorker, WorkerState};
