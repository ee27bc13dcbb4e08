use automation::{DocumentFamily, TargetFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    File,
    Folder,
    Drive,
}

impl ScopeKind {
    /// Picks the kind for a user-supplied path: regular files are `File`,
    /// filesystem roots are `Drive`, everything else is `Folder`.
    pub fn infer(path: &Path) -> Self {
        if path.is_file() {
            ScopeKind::File
        } else if path.parent().is_none() {
            ScopeKind::Drive
        } else {
            ScopeKind::Folder
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionScope {
    pub root: PathBuf,
    pub kind: ScopeKind,
}

impl ConversionScope {
    pub fn new(root: impl Into<PathBuf>, kind: ScopeKind) -> Self {
        Self {
            root: root.into(),
            kind,
        }
    }

    pub fn file(root: impl Into<PathBuf>) -> Self {
        Self::new(root, ScopeKind::File)
    }

    pub fn folder(root: impl Into<PathBuf>) -> Self {
        Self::new(root, ScopeKind::Folder)
    }

    pub fn drive(root: impl Into<PathBuf>) -> Self {
        Self::new(root, ScopeKind::Drive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyFormat {
    Doc,
    Xls,
    Ppt,
}

impl LegacyFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "doc" => Some(LegacyFormat::Doc),
            "xls" => Some(LegacyFormat::Xls),
            "ppt" => Some(LegacyFormat::Ppt),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn family(self) -> DocumentFamily {
        match self {
            LegacyFormat::Doc => DocumentFamily::Text,
            LegacyFormat::Xls => DocumentFamily::Spreadsheet,
            LegacyFormat::Ppt => DocumentFamily::Presentation,
        }
    }

    pub fn target(self) -> TargetFormat {
        self.family().target()
    }

    pub fn extension(self) -> &'static str {
        match self {
            LegacyFormat::Doc => "doc",
            LegacyFormat::Xls => "xls",
            LegacyFormat::Ppt => "ppt",
        }
    }
}

impl fmt::Display for LegacyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub legacy_format: LegacyFormat,
    pub target_format: TargetFormat,
}

impl CandidateFile {
    /// Returns a candidate when `path` carries a legacy extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let legacy_format = LegacyFormat::from_path(&path)?;
        Some(Self {
            path,
            legacy_format,
            target_format: legacy_format.target(),
        })
    }

    /// Sibling path with the same stem and the modern extension.
    pub fn target_path(&self) -> PathBuf {
        self.path.with_extension(self.target_format.extension())
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Converted,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The document could not be converted; the original is untouched.
    Conversion,
    /// The document was converted but the original could not be archived.
    Archive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TargetExists,
    TooLarge,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TargetExists => f.write_str("target already exists"),
            SkipReason::TooLarge => f.write_str("file exceeds the size limit"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub candidate: CandidateFile,
    pub status: OutcomeStatus,
    pub failure: Option<FailureKind>,
    pub skip_reason: Option<SkipReason>,
    pub error_message: Option<String>,
    pub converted_path: Option<PathBuf>,
    pub archived_path: Option<PathBuf>,
}

impl ConversionOutcome {
    pub fn converted(candidate: CandidateFile, converted_path: PathBuf) -> Self {
        Self {
            candidate,
            status: OutcomeStatus::Converted,
            failure: None,
            skip_reason: None,
            error_message: None,
            converted_path: Some(converted_path),
            archived_path: None,
        }
    }

    pub fn skipped(candidate: CandidateFile, reason: SkipReason) -> Self {
        Self {
            candidate,
            status: OutcomeStatus::Skipped,
            failure: None,
            skip_reason: Some(reason),
            error_message: None,
            converted_path: None,
            archived_path: None,
        }
    }

    pub fn failed(candidate: CandidateFile, message: impl Into<String>) -> Self {
        Self {
            candidate,
            status: OutcomeStatus::Failed,
            failure: Some(FailureKind::Conversion),
            skip_reason: None,
            error_message: Some(message.into()),
            converted_path: None,
            archived_path: None,
        }
    }

    pub fn with_archived(mut self, archived: PathBuf) -> Self {
        self.archived_path = Some(archived);
        self
    }

    /// Downgrades a converted outcome whose original could not be moved.
    pub fn archive_failed(mut self, message: impl Into<String>) -> Self {
        self.status = OutcomeStatus::Failed;
        self.failure = Some(FailureKind::Archive);
        self.error_message = Some(message.into());
        self
    }

    pub fn error_detail(&self) -> Option<String> {
        let message = self.error_message.as_deref()?;
        let name = self.candidate.file_name();
        Some(match self.failure {
            Some(FailureKind::Archive) => format!("{name}: converted but not archived: {message}"),
            _ => format!("{name}: {message}"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub converted_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub error_details: Vec<String>,
    pub archive_folder: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub cancelled: bool,
    pub outcomes: Vec<ConversionOutcome>,
}

impl BatchResult {
    pub fn from_outcomes(
        outcomes: Vec<ConversionOutcome>,
        archive_folder: PathBuf,
        cancelled: bool,
    ) -> Self {
        let mut converted_count = 0;
        let mut skipped_count = 0;
        let mut error_count = 0;
        let mut error_details = Vec::new();
        for outcome in &outcomes {
            match outcome.status {
                OutcomeStatus::Converted => converted_count += 1,
                OutcomeStatus::Skipped => skipped_count += 1,
                OutcomeStatus::Failed => {
                    error_count += 1;
                    if let Some(detail) = outcome.error_detail() {
                        error_details.push(detail);
                    }
                }
            }
        }
        Self {
            converted_count,
            skipped_count,
            error_count,
            error_details,
            archive_folder,
            manifest_path: None,
            cancelled,
            outcomes,
        }
    }

    pub fn total(&self) -> usize {
        self.converted_count + self.skipped_count + self.error_count
    }

    /// Originals that were converted but are still at their source path.
    pub fn unarchived(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter(|o| o.failure == Some(FailureKind::Archive))
            .map(|o| o.candidate.path.as_path())
    }

    /// The first `limit` error details, followed by a count of the rest.
    pub fn error_summary(&self, limit: usize) -> Vec<String> {
        let mut lines: Vec<String> = self.error_details.iter().take(limit).cloned().collect();
        if self.error_details.len() > limit {
            lines.push(format!(
                "... and {} more errors",
                self.error_details.len() - limit
            ));
        }
        lines
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageBatchResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub page_count: usize,
}

impl ImageBatchResult {
    pub fn succeeded(output_path: PathBuf, page_count: usize) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            error: None,
            page_count,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            error: Some(error.into()),
            page_count: 0,
        }
    }
}
