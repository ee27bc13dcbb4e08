//! Document automation abstractions: hosts that open legacy documents and
//! save them in a modern format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub mod noop;
pub mod soffice;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("automation host unavailable: {0}")]
    Unavailable(String),
    #[error("automation session lost: {0}")]
    SessionLost(String),
    #[error("{0}")]
    Document(String),
    #[error("automation call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The application family that handles a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFamily {
    Text,
    Spreadsheet,
    Presentation,
}

impl DocumentFamily {
    pub const ALL: [DocumentFamily; 3] = [
        DocumentFamily::Text,
        DocumentFamily::Spreadsheet,
        DocumentFamily::Presentation,
    ];

    pub fn target(self) -> TargetFormat {
        match self {
            DocumentFamily::Text => TargetFormat::Docx,
            DocumentFamily::Spreadsheet => TargetFormat::Xlsx,
            DocumentFamily::Presentation => TargetFormat::Pptx,
        }
    }

    pub fn application_name(self) -> &'static str {
        match self {
            DocumentFamily::Text => "word processor",
            DocumentFamily::Spreadsheet => "spreadsheet",
            DocumentFamily::Presentation => "presentation",
        }
    }
}

impl fmt::Display for DocumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.application_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Docx,
    Xlsx,
    Pptx,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Docx => "docx",
            TargetFormat::Xlsx => "xlsx",
            TargetFormat::Pptx => "pptx",
        }
    }

    pub fn family(self) -> DocumentFamily {
        match self {
            TargetFormat::Docx => DocumentFamily::Text,
            TargetFormat::Xlsx => DocumentFamily::Spreadsheet,
            TargetFormat::Pptx => DocumentFamily::Presentation,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(TargetFormat::Docx),
            "xlsx" => Some(TargetFormat::Xlsx),
            "pptx" => Some(TargetFormat::Pptx),
            _ => None,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_ascii_uppercase())
    }
}

/// A document opened inside a session. Only valid for the session that
/// produced it.
#[derive(Debug)]
pub struct DocumentHandle {
    id: u64,
    path: PathBuf,
}

impl DocumentHandle {
    pub fn new(id: u64, path: PathBuf) -> Self {
        Self { id, path }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A live automation session for one document family. A session handles one
/// document at a time.
pub trait AutomationSession: Send {
    fn family(&self) -> DocumentFamily;

    fn open(&mut self, path: &Path) -> Result<DocumentHandle, AutomationError>;

    fn save_as(
        &mut self,
        handle: &DocumentHandle,
        path: &Path,
        format: TargetFormat,
    ) -> Result<(), AutomationError>;

    /// Closes the document without saving over the original.
    fn close(&mut self, handle: DocumentHandle) -> Result<(), AutomationError>;

    /// Shuts the session down. Called once when the owner releases it.
    fn quit(&mut self) {}
}

pub trait AutomationHost: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Checks that the host application can be reached at all.
    fn probe(&self) -> Result<(), AutomationError>;

    fn acquire(
        &self,
        family: DocumentFamily,
    ) -> Result<Box<dyn AutomationSession>, AutomationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_map_to_same_family_targets() {
        for family in DocumentFamily::ALL {
            assert_eq!(family.target().family(), family);
        }
    }

    #[test]
    fn target_extension_lookup_is_case_insensitive() {
        assert_eq!(TargetFormat::from_extension("DOCX"), Some(TargetFormat::Docx));
        assert_eq!(TargetFormat::from_extension("xls"), None);
        assert_eq!(TargetFormat::Pptx.to_string(), "PPTX");
    }
}
