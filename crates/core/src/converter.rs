//! Converts single candidates through automation sessions, one session per
//! document family for the lifetime of a batch.

use crate::config::ConversionConfig;
use crate::models::{CandidateFile, ConversionOutcome, SkipReason};
use crate::progress::ProgressSink;
use automation::{AutomationError, AutomationHost, AutomationSession, DocumentFamily};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Converter {
    host: Arc<dyn AutomationHost>,
    sessions: HashMap<DocumentFamily, Box<dyn AutomationSession>>,
    max_file_size: u64,
}

impl Converter {
    /// Acquires one session for each family in `families`. A family that
    /// cannot be acquired is left out and its files fail one by one; only
    /// when no requested family comes up is the last error returned.
    pub fn acquire(
        host: Arc<dyn AutomationHost>,
        families: impl IntoIterator<Item = DocumentFamily>,
        settings: &ConversionConfig,
    ) -> Result<Self, AutomationError> {
        let mut converter = Self {
            host,
            sessions: HashMap::new(),
            max_file_size: settings.max_file_size_bytes(),
        };
        let mut last_error = None;
        for family in families {
            if converter.sessions.contains_key(&family) {
                continue;
            }
            match converter.host.acquire(family) {
                Ok(session) => {
                    info!(host = converter.host.name(), %family, "automation session started");
                    converter.sessions.insert(family, session);
                }
                Err(e) => {
                    warn!(host = converter.host.name(), %family, "cannot start automation session: {e}");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if converter.sessions.is_empty() => Err(e),
            _ => Ok(converter),
        }
    }

    /// Converts one candidate into its sibling target file.
    pub fn convert(&mut self, candidate: &CandidateFile, sink: &dyn ProgressSink) -> ConversionOutcome {
        let target = candidate.target_path();
        let name = candidate.file_name();

        if target.exists() {
            debug!(path = %candidate.path.display(), "target exists, skipping");
            return ConversionOutcome::skipped(candidate.clone(), SkipReason::TargetExists);
        }
        match fs::metadata(&candidate.path) {
            Ok(meta) if meta.len() > self.max_file_size => {
                return ConversionOutcome::skipped(candidate.clone(), SkipReason::TooLarge);
            }
            Ok(_) => {}
            Err(e) => {
                return ConversionOutcome::failed(candidate.clone(), format!("cannot read file: {e}"))
            }
        }

        let family = candidate.legacy_format.family();
        sink.on_sub_progress(&format!("Preparing {family}..."), 10);
        let session = match self.session_for(family) {
            Ok(session) => session,
            Err(e) => return ConversionOutcome::failed(candidate.clone(), e.to_string()),
        };

        sink.on_sub_progress(&format!("Opening {name}..."), 25);
        let result = match session.open(&candidate.path) {
            Ok(handle) => {
                sink.on_sub_progress(
                    &format!("Converting to {}...", candidate.target_format),
                    50,
                );
                sink.on_sub_progress("Saving converted file...", 75);
                let saved = session.save_as(&handle, &target, candidate.target_format);
                let closed = session.close(handle);
                saved.and(closed)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) if target.exists() => ConversionOutcome::converted(candidate.clone(), target),
            Ok(()) => ConversionOutcome::failed(
                candidate.clone(),
                "automation reported success but no converted file was written",
            ),
            Err(e) => {
                // Never leave a half-written target behind.
                if target.exists() {
                    if let Err(rm) = fs::remove_file(&target) {
                        warn!(path = %target.display(), "cannot remove partial output: {rm}");
                    }
                }
                if matches!(e, AutomationError::SessionLost(_)) {
                    self.drop_session(family);
                }
                warn!(path = %candidate.path.display(), "conversion failed: {e}");
                ConversionOutcome::failed(candidate.clone(), e.to_string())
            }
        }
    }

    /// Returns the live session for `family`, re-acquiring it if an earlier
    /// failure dropped it.
    fn session_for(
        &mut self,
        family: DocumentFamily,
    ) -> Result<&mut Box<dyn AutomationSession>, AutomationError> {
        if !self.sessions.contains_key(&family) {
            let session = self.host.acquire(family)?;
            info!(host = self.host.name(), %family, "automation session re-acquired");
            self.sessions.insert(family, session);
        }
        self.sessions
            .get_mut(&family)
            .ok_or_else(|| AutomationError::SessionLost(format!("no {family} session")))
    }

    fn drop_session(&mut self, family: DocumentFamily) {
        if let Some(mut session) = self.sessions.remove(&family) {
            session.quit();
        }
    }

    /// Quits every session. Safe to call more than once.
    pub fn release(&mut self) {
        for (family, mut session) in self.sessions.drain() {
            session.quit();
            debug!(%family, "automation session closed");
        }
    }
}

impl Drop for Converter {
    fn drop(&mut self) {
        self.release();
    }
}
