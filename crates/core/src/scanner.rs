//! Discovers legacy Office documents under a conversion scope.

use crate::config::ScanConfig;
use crate::models::{CandidateFile, ConversionScope, ScopeKind};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Lazy, single-pass sequence of candidates for one scope.
pub struct Discovery {
    inner: Box<dyn Iterator<Item = CandidateFile> + Send>,
}

impl Iterator for Discovery {
    type Item = CandidateFile;

    fn next(&mut self) -> Option<CandidateFile> {
        self.inner.next()
    }
}

/// Filters applied while walking, on top of the extension check.
#[derive(Clone)]
struct WalkFilter {
    excludes: GlobSet,
    include_hidden: bool,
    archive_prefix: Option<String>,
}

impl WalkFilter {
    fn should_descend(&self, entry: &DirEntry) -> bool {
        // The scope root itself is always entered.
        if entry.depth() == 0 {
            return true;
        }
        let path = entry.path();
        if is_excluded(path, &self.excludes) {
            return false;
        }
        if !self.include_hidden && is_hidden(path) {
            return false;
        }
        if entry.file_type().is_dir() && self.is_archive_dir(path) {
            return false;
        }
        true
    }

    fn is_archive_dir(&self, path: &Path) -> bool {
        match (&self.archive_prefix, file_name(path)) {
            (Some(prefix), Some(name)) => name.starts_with(prefix.as_str()),
            _ => false,
        }
    }
}

/// Starts discovery for `scope`. `archive_prefix` names per-run archive
/// folders, which are never descended into.
pub fn discover(
    scope: &ConversionScope,
    settings: &ScanConfig,
    archive_prefix: Option<&str>,
) -> anyhow::Result<Discovery> {
    if scope.kind == ScopeKind::File {
        let candidate = if scope.root.is_file() && !is_lock_file(&scope.root) {
            CandidateFile::from_path(&scope.root)
        } else {
            None
        };
        if candidate.is_none() {
            debug!(path = %scope.root.display(), "file scope holds no legacy document");
        }
        return Ok(Discovery {
            inner: Box::new(candidate.into_iter()),
        });
    }

    if !scope.root.is_dir() {
        warn!(path = %scope.root.display(), "scope root is not a readable directory");
    }

    let filter = WalkFilter {
        excludes: build_globset(&settings.exclude)?,
        include_hidden: settings.include_hidden,
        archive_prefix: archive_prefix.map(str::to_string),
    };
    let walker = WalkDir::new(&scope.root)
        .follow_links(settings.follow_links)
        .into_iter()
        .filter_entry(move |e| filter.should_descend(e))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                // Permission-denied subtrees and vanished entries are skipped.
                debug!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && !is_lock_file(e.path()))
        .filter_map(|e| CandidateFile::from_path(e.into_path()));

    Ok(Discovery {
        inner: Box::new(walker),
    })
}

/// Drive roots that currently exist.
pub fn available_drives() -> Vec<PathBuf> {
    if cfg!(windows) {
        (b'A'..=b'Z')
            .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
            .filter(|p| p.exists())
            .collect()
    } else {
        vec![PathBuf::from("/")]
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn is_hidden(path: &Path) -> bool {
    file_name(path).map(|s| s.starts_with('.')).unwrap_or(false)
}

/// Office owner files such as `~$report.doc`.
fn is_lock_file(path: &Path) -> bool {
    file_name(path).map(|s| s.starts_with("~$")).unwrap_or(false)
}

fn is_excluded(path: &Path, excludes: &GlobSet) -> bool {
    excludes.is_match(path)
}
