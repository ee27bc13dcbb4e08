//! Batch orchestration: discovery, per-file conversion, archiving, and the
//! aggregated result.

use crate::archive::{ArchiveManager, RunId};
use crate::config::AppConfig;
use crate::converter::Converter;
use crate::error::BatchError;
use crate::models::{BatchResult, CandidateFile, ConversionOutcome, ConversionScope, OutcomeStatus};
use crate::progress::{CancelToken, ProgressSink};
use crate::scanner;
use automation::{AutomationHost, DocumentFamily};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Discovering,
    /// Zero-based index of the candidate in flight.
    Converting(usize),
    Cancelling,
    Finalizing,
    Done,
}

pub struct ConversionWorker {
    host: Arc<dyn AutomationHost>,
    config: AppConfig,
    sink: Arc<dyn ProgressSink>,
    cancel: CancelToken,
    state: WorkerState,
    run_id: Option<RunId>,
}

impl ConversionWorker {
    pub fn new(host: Arc<dyn AutomationHost>, config: &AppConfig, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            host,
            config: config.clone(),
            sink,
            cancel: CancelToken::new(),
            state: WorkerState::Idle,
            run_id: None,
        }
    }

    /// Uses a fixed run id instead of the current time.
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Requests cancellation. The file in flight is allowed to finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(from = ?self.state, to = ?next, "worker state");
        self.state = next;
        self.sink.on_state(next);
    }

    /// Runs one batch over `scope`. An unavailable automation host or an
    /// unusable scan setup fails the batch; every other problem is recorded
    /// per file.
    pub fn run(&mut self, scope: &ConversionScope) -> Result<BatchResult, BatchError> {
        self.state = WorkerState::Idle;
        let result = self.run_batch(scope);
        self.transition(WorkerState::Done);
        result
    }

    fn run_batch(&mut self, scope: &ConversionScope) -> Result<BatchResult, BatchError> {
        if let Err(e) = self.host.probe() {
            warn!(host = self.host.name(), "automation probe failed: {e}");
            return Err(BatchError::AutomationUnavailable(e));
        }

        let run_id = self.run_id.clone().unwrap_or_else(RunId::now);
        let mut archive = ArchiveManager::new(
            &self.config.archive.base_dir(),
            &self.config.archive.prefix,
            &run_id,
            scope,
        );
        info!(
            root = %scope.root.display(),
            kind = ?scope.kind,
            archive = %archive.root().display(),
            "starting conversion batch"
        );

        self.transition(WorkerState::Discovering);
        let candidates = match self.discover(scope)? {
            Some(candidates) => candidates,
            None => {
                self.transition(WorkerState::Cancelling);
                return Ok(BatchResult::from_outcomes(
                    Vec::new(),
                    archive.root().to_path_buf(),
                    true,
                ));
            }
        };
        info!(count = candidates.len(), "discovered candidates");

        let families: HashSet<DocumentFamily> = candidates
            .iter()
            .map(|c| c.legacy_format.family())
            .collect();
        let mut converter = Converter::acquire(
            self.host.clone(),
            families_in_order(&families),
            &self.config.conversion,
        )
        .map_err(|e| {
            warn!("cannot acquire any automation session: {e}");
            BatchError::AutomationUnavailable(e)
        })?;

        let total = candidates.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;
        for (idx, candidate) in candidates.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                self.transition(WorkerState::Cancelling);
                break;
            }
            self.transition(WorkerState::Converting(idx));
            self.sink.on_progress(idx + 1, total, &candidate.path);
            let outcome = self.process(&mut converter, &mut archive, candidate);
            outcomes.push(outcome);
        }

        if !cancelled {
            self.transition(WorkerState::Finalizing);
        }
        converter.release();
        let mut result = BatchResult::from_outcomes(outcomes, archive.root().to_path_buf(), cancelled);
        if self.config.archive.write_manifest {
            match archive.write_manifest() {
                Ok(path) => result.manifest_path = path,
                Err(e) => warn!("cannot write archive manifest: {e}"),
            }
        }
        info!(
            converted = result.converted_count,
            skipped = result.skipped_count,
            errors = result.error_count,
            cancelled,
            "conversion batch finished"
        );
        Ok(result)
    }

    /// Collects candidates, or `None` when cancelled mid-walk.
    fn discover(&self, scope: &ConversionScope) -> Result<Option<Vec<CandidateFile>>, BatchError> {
        let discovery = scanner::discover(
            scope,
            &self.config.scan,
            Some(self.config.archive.prefix.as_str()),
        )
        .map_err(|e| {
            warn!("discovery setup failed: {e}");
            BatchError::Discovery(e.to_string())
        })?;
        let mut candidates = Vec::new();
        for candidate in discovery {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            candidates.push(candidate);
        }
        if self.cancel.is_cancelled() {
            return Ok(None);
        }
        Ok(Some(candidates))
    }

    fn process(
        &self,
        converter: &mut Converter,
        archive: &mut ArchiveManager,
        candidate: CandidateFile,
    ) -> ConversionOutcome {
        let outcome = converter.convert(&candidate, self.sink.as_ref());
        if outcome.status != OutcomeStatus::Converted {
            return outcome;
        }
        self.sink.on_sub_progress("Archiving original...", 90);
        let outcome = match archive.archive(&candidate.path) {
            Ok(archived) => outcome.with_archived(archived),
            Err(e) => {
                warn!(path = %candidate.path.display(), "converted but not archived: {e}");
                outcome.archive_failed(e.to_string())
            }
        };
        self.sink.on_sub_progress("Completed!", 100);
        outcome
    }

    /// Runs the batch on its own thread.
    pub fn spawn(mut self, scope: ConversionScope) -> Result<BatchHandle, BatchError> {
        let cancel = self.cancel.clone();
        let join = thread::Builder::new()
            .name("conversion-worker".into())
            .spawn(move || self.run(&scope))
            .map_err(BatchError::Spawn)?;
        Ok(BatchHandle { cancel, join })
    }
}

fn families_in_order(families: &HashSet<DocumentFamily>) -> Vec<DocumentFamily> {
    DocumentFamily::ALL
        .into_iter()
        .filter(|f| families.contains(f))
        .collect()
}

/// Owner side of a spawned batch.
pub struct BatchHandle {
    cancel: CancelToken,
    join: JoinHandle<Result<BatchResult, BatchError>>,
}

impl BatchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the batch and returns its result.
    pub fn join(self) -> Result<BatchResult, BatchError> {
        self.join.join().map_err(|_| BatchError::WorkerPanicked)?
    }
}
