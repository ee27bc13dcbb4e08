#![allow(dead_code)]

use automation::{
    AutomationError, AutomationHost, AutomationSession, DocumentFamily, DocumentHandle,
    TargetFormat,
};
use converter_core::config::AppConfig;
use converter_core::progress::{CancelToken, ProgressSink};
use converter_core::WorkerState;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Documents starting with this marker fail to convert.
pub const CORRUPT: &[u8] = b"CORRUPT";

#[derive(Clone, Default)]
pub struct Counters {
    pub acquired: Arc<AtomicUsize>,
    pub quit: Arc<AtomicUsize>,
    pub saves: Arc<AtomicUsize>,
    pub save_attempts: Arc<AtomicUsize>,
}

impl Counters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn quit(&self) -> usize {
        self.quit.load(Ordering::SeqCst)
    }
}

/// Automation host that "converts" by copying bytes to the target path.
#[derive(Clone, Default)]
pub struct FakeHost {
    pub unavailable: bool,
    pub refuse_families: Vec<DocumentFamily>,
    /// 1-based save attempt that drops the session, whichever file it is.
    pub lose_session_on_save: Option<usize>,
    /// Cancel this token once this many saves have completed.
    pub cancel_after: Option<(usize, CancelToken)>,
    pub counters: Counters,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AutomationHost for FakeHost {
    fn name(&self) -> &str {
        "fake"
    }

    fn probe(&self) -> Result<(), AutomationError> {
        if self.unavailable {
            Err(AutomationError::Unavailable("office is not installed".into()))
        } else {
            Ok(())
        }
    }

    fn acquire(
        &self,
        family: DocumentFamily,
    ) -> Result<Box<dyn AutomationSession>, AutomationError> {
        if self.unavailable || self.refuse_families.contains(&family) {
            return Err(AutomationError::Unavailable(format!("no {family} application")));
        }
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            family,
            host: self.clone(),
            next_id: 0,
            open: None,
        }))
    }
}

struct FakeSession {
    family: DocumentFamily,
    host: FakeHost,
    next_id: u64,
    open: Option<u64>,
}

impl AutomationSession for FakeSession {
    fn family(&self) -> DocumentFamily {
        self.family
    }

    fn open(&mut self, path: &Path) -> Result<DocumentHandle, AutomationError> {
        if self.open.is_some() {
            return Err(AutomationError::Document("session busy".into()));
        }
        fs::metadata(path)?;
        self.next_id += 1;
        self.open = Some(self.next_id);
        Ok(DocumentHandle::new(self.next_id, path.to_path_buf()))
    }

    fn save_as(
        &mut self,
        handle: &DocumentHandle,
        path: &Path,
        format: TargetFormat,
    ) -> Result<(), AutomationError> {
        assert_eq!(format.family(), self.family, "cross-family conversion");
        let attempt = self.host.counters.save_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.host.lose_session_on_save == Some(attempt) {
            return Err(AutomationError::SessionLost("application crashed".into()));
        }
        let bytes = fs::read(handle.path())?;
        if bytes.starts_with(CORRUPT) {
            // Leave a half-written file behind, as a crashing save would.
            fs::write(path, b"partial")?;
            return Err(AutomationError::Document(
                "document is corrupt or password protected".into(),
            ));
        }
        fs::write(path, [b"converted:".as_slice(), bytes.as_slice()].concat())?;
        let saves = self.host.counters.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.host.cancel_after {
            if saves >= *limit {
                token.cancel();
            }
        }
        Ok(())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), AutomationError> {
        match self.open.take() {
            Some(id) if id == handle.id() => Ok(()),
            _ => Err(AutomationError::Document("handle not open".into())),
        }
    }

    fn quit(&mut self) {
        self.host.counters.quit.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub overall: Mutex<Vec<(usize, usize, PathBuf)>>,
    pub sub: Mutex<Vec<(String, u8)>>,
    pub states: Mutex<Vec<WorkerState>>,
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, current: usize, total: usize, path: &Path) {
        self.overall
            .lock()
            .unwrap()
            .push((current, total, path.to_path_buf()));
    }

    fn on_sub_progress(&self, message: &str, percent: u8) {
        self.sub.lock().unwrap().push((message.to_string(), percent));
    }

    fn on_state(&self, state: WorkerState) {
        self.states.lock().unwrap().push(state);
    }
}

pub fn config_with_archive(base: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.archive.base_dir = Some(base.to_string_lossy().into_owned());
    cfg
}

pub fn write(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}
