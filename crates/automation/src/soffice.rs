//! LibreOffice headless backend. Every conversion runs `soffice --convert-to`
//! against a profile directory private to the session, so a desktop instance
//! the user already has open does not grab the request.

use crate::{
    AutomationError, AutomationHost, AutomationSession, DocumentFamily, DocumentHandle,
    TargetFormat,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SofficeConfig {
    pub binary: PathBuf,
    pub timeout: Duration,
    pub profile_root: PathBuf,
}

impl Default for SofficeConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(default_binary()),
            timeout: Duration::from_secs(300),
            profile_root: std::env::temp_dir(),
        }
    }
}

fn default_binary() -> &'static str {
    if cfg!(windows) {
        "soffice.exe"
    } else {
        "soffice"
    }
}

#[derive(Debug, Clone)]
pub struct SofficeHost {
    cfg: SofficeConfig,
}

impl SofficeHost {
    pub fn new(cfg: SofficeConfig) -> Self {
        Self { cfg }
    }
}

impl AutomationHost for SofficeHost {
    fn name(&self) -> &str {
        "soffice"
    }

    fn probe(&self) -> Result<(), AutomationError> {
        let mut cmd = Command::new(&self.cfg.binary);
        cmd.arg("--version");
        match run_with_timeout(cmd, PROBE_TIMEOUT) {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(AutomationError::Unavailable(format!(
                "{} --version exited with {status}",
                self.cfg.binary.display()
            ))),
            Err(AutomationError::Io(e)) => Err(AutomationError::Unavailable(format!(
                "cannot start {}: {e}",
                self.cfg.binary.display()
            ))),
            Err(e) => Err(AutomationError::Unavailable(e.to_string())),
        }
    }

    fn acquire(
        &self,
        family: DocumentFamily,
    ) -> Result<Box<dyn AutomationSession>, AutomationError> {
        let profile = self.cfg.profile_root.join(format!(
            "converter-soffice-{}-{:?}",
            std::process::id(),
            family
        ));
        fs::create_dir_all(&profile).map_err(|e| {
            AutomationError::Unavailable(format!(
                "cannot create profile dir {}: {e}",
                profile.display()
            ))
        })?;
        debug!(?family, profile = %profile.display(), "acquired soffice session");
        Ok(Box::new(SofficeSession {
            binary: self.cfg.binary.clone(),
            timeout: self.cfg.timeout,
            family,
            profile,
            next_id: 0,
            current: None,
        }))
    }
}

struct SofficeSession {
    binary: PathBuf,
    timeout: Duration,
    family: DocumentFamily,
    profile: PathBuf,
    next_id: u64,
    current: Option<(u64, PathBuf)>,
}

impl SofficeSession {
    fn convert_command(&self, source: &Path, outdir: &Path, format: TargetFormat) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(format!("-env:UserInstallation={}", file_url(&self.profile)))
            .arg("--headless")
            .arg("--norestore")
            .arg("--nolockcheck")
            .arg("--convert-to")
            .arg(filter_for(format))
            .arg("--outdir")
            .arg(outdir)
            .arg(source);
        cmd
    }
}

impl AutomationSession for SofficeSession {
    fn family(&self) -> DocumentFamily {
        self.family
    }

    fn open(&mut self, path: &Path) -> Result<DocumentHandle, AutomationError> {
        if self.current.is_some() {
            return Err(AutomationError::Document(
                "another document is already open in this session".into(),
            ));
        }
        fs::File::open(path).map_err(|e| {
            AutomationError::Document(format!("cannot open {}: {e}", path.display()))
        })?;
        self.next_id += 1;
        self.current = Some((self.next_id, path.to_path_buf()));
        Ok(DocumentHandle::new(self.next_id, path.to_path_buf()))
    }

    fn save_as(
        &mut self,
        handle: &DocumentHandle,
        path: &Path,
        format: TargetFormat,
    ) -> Result<(), AutomationError> {
        match &self.current {
            Some((id, _)) if *id == handle.id() => {}
            _ => {
                return Err(AutomationError::Document(
                    "document handle is not open in this session".into(),
                ))
            }
        }
        let outdir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let produced = produced_path(handle.path(), outdir, format);

        let cmd = self.convert_command(handle.path(), outdir, format);
        let status = match run_with_timeout(cmd, self.timeout) {
            Ok(status) => status,
            Err(AutomationError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AutomationError::SessionLost(format!(
                    "{} is no longer available: {e}",
                    self.binary.display()
                )))
            }
            Err(e) => return Err(e),
        };
        if !status.success() {
            return Err(AutomationError::Document(format!(
                "conversion exited with {status} (corrupt or password-protected document?)"
            )));
        }
        if !produced.exists() {
            return Err(AutomationError::Document(
                "conversion produced no output (corrupt or password-protected document?)".into(),
            ));
        }
        if produced != path {
            fs::rename(&produced, path)?;
        }
        Ok(())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), AutomationError> {
        match self.current.take() {
            Some((id, _)) if id == handle.id() => Ok(()),
            other => {
                self.current = other;
                Err(AutomationError::Document(
                    "document handle is not open in this session".into(),
                ))
            }
        }
    }

    fn quit(&mut self) {
        self.current = None;
        if let Err(e) = fs::remove_dir_all(&self.profile) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(profile = %self.profile.display(), "failed to remove soffice profile: {e}");
            }
        }
    }
}

fn filter_for(format: TargetFormat) -> &'static str {
    match format {
        TargetFormat::Docx => "docx:MS Word 2007 XML",
        TargetFormat::Xlsx => "xlsx:Calc MS Excel 2007 XML",
        TargetFormat::Pptx => "pptx:Impress MS PowerPoint 2007 XML",
    }
}

/// Where soffice writes its output: `<outdir>/<source stem>.<ext>`.
fn produced_path(source: &Path, outdir: &Path, format: TargetFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "document".into());
    let mut name = stem;
    name.push(".");
    name.push(format.extension());
    outdir.join(name)
}

fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    if raw.starts_with('/') {
        format!("file://{raw}")
    } else {
        format!("file:///{raw}")
    }
}

/// Runs `cmd` to completion, killing it once `timeout` elapses.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<ExitStatus, AutomationError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AutomationError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produced_path_uses_source_stem() {
        let p = produced_path(Path::new("/data/q1 report.doc"), Path::new("/data"), TargetFormat::Docx);
        assert_eq!(p, PathBuf::from("/data/q1 report.docx"));
    }

    #[test]
    fn file_url_handles_both_path_styles() {
        assert_eq!(file_url(Path::new("/tmp/profile")), "file:///tmp/profile");
        assert_eq!(file_url(Path::new("C:\\Temp\\p")), "file:///C:/Temp/p");
    }

    #[test]
    fn probe_reports_missing_binary_as_unavailable() {
        let host = SofficeHost::new(SofficeConfig {
            binary: PathBuf::from("definitely-not-an-office-suite-binary"),
            ..SofficeConfig::default()
        });
        assert!(matches!(host.probe(), Err(AutomationError::Unavailable(_))));
    }

    #[test]
    fn session_refuses_second_open_and_unknown_handles() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("a.doc");
        fs::write(&doc, b"legacy").unwrap();
        let host = SofficeHost::new(SofficeConfig {
            profile_root: dir.path().to_path_buf(),
            ..SofficeConfig::default()
        });
        let mut session = host.acquire(DocumentFamily::Text).unwrap();
        let handle = session.open(&doc).unwrap();
        assert!(matches!(session.open(&doc), Err(AutomationError::Document(_))));

        let stray = DocumentHandle::new(handle.id() + 1, doc.clone());
        assert!(session.close(stray).is_err());
        session.close(handle).unwrap();
        session.quit();
    }

    #[test]
    fn open_fails_for_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let host = SofficeHost::new(SofficeConfig {
            profile_root: dir.path().to_path_buf(),
            ..SofficeConfig::default()
        });
        let mut session = host.acquire(DocumentFamily::Spreadsheet).unwrap();
        let err = session.open(&dir.path().join("missing.xls")).unwrap_err();
        assert!(err.to_string().contains("cannot open"));
        session.quit();
    }
}
