//! Per-run archive of converted originals.
//!
//! Each run gets `<base>/<prefix>_<YYYYmmdd_HHMMSS>`; originals keep their
//! path relative to the scope base inside it, so files with equal names from
//! different folders do not collide. A manifest records every move so the
//! archive can be restored.

use crate::error::ArchiveError;
use crate::models::{ConversionScope, ScopeKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

pub const MANIFEST_FILE: &str = "archive-manifest.json";

/// Timestamp identifying one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId(String);

impl RunId {
    pub fn now() -> Self {
        Self(chrono::Local::now().format("%Y%m%d_%H%M%S").to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub original: PathBuf,
    pub archived: PathBuf,
    pub blake3: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub run_id: String,
    pub scope: ConversionScope,
    pub entries: Vec<ArchiveEntry>,
}

pub struct ArchiveManager {
    root: PathBuf,
    base: Option<PathBuf>,
    run_id: RunId,
    scope: ConversionScope,
    entries: Vec<ArchiveEntry>,
}

impl ArchiveManager {
    pub fn new(base_dir: &Path, prefix: &str, run_id: &RunId, scope: &ConversionScope) -> Self {
        let root = base_dir.join(format!("{}_{}", prefix, run_id.as_str()));
        Self {
            root,
            base: relative_base(scope),
            run_id: run_id.clone(),
            scope: scope.clone(),
            entries: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Moves `original` under the archive root and returns its new path.
    pub fn archive(&mut self, original: &Path) -> Result<PathBuf, ArchiveError> {
        let dest = self.destination_for(original);
        let parent = dest.parent().unwrap_or(self.root.as_path()).to_path_buf();
        fs::create_dir_all(&parent).map_err(|source| ArchiveError::CreateDir {
            path: parent.clone(),
            source,
        })?;
        let dest = resolve_conflict(&dest);
        let digest = file_digest(original)?;
        move_file(original, &dest)?;
        debug!(from = %original.display(), to = %dest.display(), "archived original");
        self.entries.push(ArchiveEntry {
            original: original.to_path_buf(),
            archived: dest.clone(),
            blake3: digest,
        });
        Ok(dest)
    }

    /// Writes the manifest when at least one file was archived.
    pub fn write_manifest(&self) -> Result<Option<PathBuf>, ArchiveError> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        let path = self.root.join(MANIFEST_FILE);
        let manifest = ArchiveManifest {
            run_id: self.run_id.as_str().to_string(),
            scope: self.scope.clone(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| ArchiveError::Manifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&path, json)?;
        info!(path = %path.display(), files = self.entries.len(), "wrote archive manifest");
        Ok(Some(path))
    }

    fn destination_for(&self, original: &Path) -> PathBuf {
        let relative = self
            .base
            .as_deref()
            .and_then(|base| original.strip_prefix(base).ok())
            .filter(|rel| rel.components().all(|c| matches!(c, Component::Normal(_))))
            .map(Path::to_path_buf)
            .unwrap_or_else(|| parent_and_name(original));
        self.root.join(relative)
    }
}

/// The directory archived paths are taken relative to: the folder's parent
/// (so the folder name is kept), the file's grandparent, or the drive root.
fn relative_base(scope: &ConversionScope) -> Option<PathBuf> {
    match scope.kind {
        ScopeKind::Drive => Some(scope.root.clone()),
        ScopeKind::Folder => scope.root.parent().map(Path::to_path_buf),
        ScopeKind::File => scope
            .root
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf),
    }
}

fn parent_and_name(path: &Path) -> PathBuf {
    let name = path.file_name().unwrap_or(path.as_os_str());
    match path.parent().and_then(|p| p.file_name()) {
        Some(parent) => Path::new(parent).join(name),
        None => PathBuf::from(name),
    }
}

fn resolve_conflict(dest: &Path) -> PathBuf {
    if !dest.exists() {
        return dest.to_path_buf();
    }
    let stem = dest
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut counter = 1;
    loop {
        let name = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Renames, falling back to copy + remove when the archive is on another
/// volume. A copy whose source cannot be removed is rolled back.
fn move_file(from: &Path, to: &Path) -> Result<(), ArchiveError> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    debug!(from = %from.display(), "rename failed ({rename_err}), copying instead");
    let move_err = |source| ArchiveError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if let Err(copy_err) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(move_err(copy_err));
    }
    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(move_err(e));
    }
    Ok(())
}

fn file_digest(path: &Path) -> Result<String, ArchiveError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[derive(Debug, Default, Serialize)]
pub struct RestoreReport {
    pub restored: Vec<PathBuf>,
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
}

pub fn load_manifest(archive_root: &Path) -> Result<ArchiveManifest, ArchiveError> {
    let path = archive_root.join(MANIFEST_FILE);
    let raw = fs::read(&path).map_err(|e| ArchiveError::Manifest {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    serde_json::from_slice(&raw).map_err(|e| ArchiveError::Manifest {
        path,
        reason: e.to_string(),
    })
}

/// Moves every archived original back to where it came from. Entries whose
/// source path is occupied or whose content changed are left in place.
pub fn restore(archive_root: &Path) -> Result<RestoreReport, ArchiveError> {
    let manifest = load_manifest(archive_root)?;
    let mut report = RestoreReport::default();
    for entry in manifest.entries {
        if entry.original.exists() {
            report.skipped.push(format!(
                "{}: original location is occupied",
                entry.original.display()
            ));
            continue;
        }
        match file_digest(&entry.archived) {
            Ok(digest) if digest == entry.blake3 => {}
            Ok(_) => {
                report.skipped.push(format!(
                    "{}: archived copy was modified",
                    entry.archived.display()
                ));
                continue;
            }
            Err(e) => {
                report.errors.push(e.to_string());
                continue;
            }
        }
        if let Some(parent) = entry.original.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                report.errors.push(format!("{}: {e}", parent.display()));
                continue;
            }
        }
        match move_file(&entry.archived, &entry.original) {
            Ok(()) => report.restored.push(entry.original),
            Err(e) => {
                warn!("restore failed: {e}");
                report.errors.push(e.to_string());
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunId {
        RunId::from_string("20240101_120000")
    }

    #[test]
    fn folder_scope_keeps_folder_name_and_subpaths() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("reports");
        fs::create_dir_all(folder.join("2019")).unwrap();
        let original = folder.join("2019").join("q1.doc");
        fs::write(&original, b"old").unwrap();

        let base = tmp.path().join("backup");
        let mut archive = ArchiveManager::new(
            &base,
            "Office_Archive",
            &run(),
            &ConversionScope::folder(&folder),
        );
        let archived = archive.archive(&original).unwrap();

        assert_eq!(
            archived,
            base.join("Office_Archive_20240101_120000")
                .join("reports")
                .join("2019")
                .join("q1.doc")
        );
        assert!(!original.exists());
        assert_eq!(fs::read(&archived).unwrap(), b"old");
    }

    #[test]
    fn file_scope_uses_parent_folder_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("inbox");
        fs::create_dir_all(&dir).unwrap();
        let original = dir.join("memo.doc");
        fs::write(&original, b"memo").unwrap();

        let mut archive =
            ArchiveManager::new(tmp.path(), "A", &run(), &ConversionScope::file(&original));
        let archived = archive.archive(&original).unwrap();
        assert_eq!(archived, archive.root().join("inbox").join("memo.doc"));
    }

    #[test]
    fn name_collisions_get_counter_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("src");
        fs::create_dir_all(&folder).unwrap();
        let scope = ConversionScope::folder(&folder);
        let mut archive = ArchiveManager::new(&tmp.path().join("arc"), "A", &run(), &scope);

        let original = folder.join("a.xls");
        fs::write(&original, b"one").unwrap();
        let first = archive.archive(&original).unwrap();
        fs::write(&original, b"two").unwrap();
        let second = archive.archive(&original).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "a_1.xls");
        assert_eq!(fs::read(second).unwrap(), b"two");
    }

    #[test]
    fn manifest_round_trips_through_restore() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("docs");
        fs::create_dir_all(&folder).unwrap();
        let a = folder.join("a.doc");
        let b = folder.join("b.ppt");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let mut archive = ArchiveManager::new(
            &tmp.path().join("arc"),
            "A",
            &run(),
            &ConversionScope::folder(&folder),
        );
        archive.archive(&a).unwrap();
        archive.archive(&b).unwrap();
        let manifest = archive.write_manifest().unwrap().unwrap();
        assert!(manifest.exists());

        // Something new now sits where b.ppt used to be.
        fs::write(&b, b"new").unwrap();

        let report = restore(archive.root()).unwrap();
        assert_eq!(report.restored, vec![a.clone()]);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.errors.is_empty());
        assert_eq!(fs::read(&a).unwrap(), b"a");
        assert_eq!(fs::read(&b).unwrap(), b"new");
    }

    #[test]
    fn empty_run_writes_no_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = ArchiveManager::new(
            tmp.path(),
            "A",
            &run(),
            &ConversionScope::folder(tmp.path()),
        );
        assert!(archive.write_manifest().unwrap().is_none());
        assert!(!archive.root().exists());
    }

    #[test]
    fn missing_original_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut archive = ArchiveManager::new(
            tmp.path(),
            "A",
            &run(),
            &ConversionScope::folder(tmp.path()),
        );
        assert!(archive.archive(&tmp.path().join("gone.doc")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn failed_copy_fallback_reports_the_copy_error() {
        let tmp = tempfile::tempdir().unwrap();
        // Renaming a directory onto a non-empty one fails; copying a
        // directory fails for a different reason.
        let from = tmp.path().join("src_dir");
        fs::create_dir_all(&from).unwrap();
        let to = tmp.path().join("occupied");
        fs::create_dir_all(&to).unwrap();
        fs::write(to.join("keep.txt"), b"keep").unwrap();

        match move_file(&from, &to) {
            Err(ArchiveError::Move { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidInput)
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(from.exists());
        assert!(to.join("keep.txt").exists());
    }
}
