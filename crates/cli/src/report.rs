//! Human-readable and JSON renderings of worker results.

use converter_core::archive::RestoreReport;
use converter_core::models::{BatchResult, ImageBatchResult};
use converter_core::ProgressEvent;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// One line per started file, e.g. `[3/10] C:\docs\a.doc`.
pub fn progress_line(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::Overall {
            current,
            total,
            path,
        } => Some(format!("[{current}/{total}] {}", path.display())),
        _ => None,
    }
}

pub fn batch_summary(result: &BatchResult, max_error_lines: usize) -> String {
    let mut out = String::new();
    if result.cancelled {
        out.push_str("Conversion cancelled.\n");
    } else {
        out.push_str("Conversion complete.\n");
    }
    let _ = writeln!(out, "Files converted: {}", result.converted_count);
    let _ = writeln!(out, "Files skipped: {}", result.skipped_count);
    let _ = writeln!(out, "Errors: {}", result.error_count);

    let details = result.error_summary(max_error_lines);
    if !details.is_empty() {
        out.push_str("\nError details:\n");
        for line in details {
            let _ = writeln!(out, "  - {line}");
        }
    }

    let unarchived: Vec<&Path> = result.unarchived().collect();
    if !unarchived.is_empty() {
        out.push_str("\nConverted but still in place (archive failed):\n");
        for path in unarchived {
            let _ = writeln!(out, "  - {}", path.display());
        }
    }

    if result.converted_count > 0 {
        let _ = writeln!(
            out,
            "\nOriginals were moved to: {}",
            result.archive_folder.display()
        );
        if let Some(manifest) = &result.manifest_path {
            let _ = writeln!(out, "Manifest: {}", manifest.display());
        }
    }
    out
}

pub fn batch_json(result: &BatchResult) -> serde_json::Value {
    serde_json::json!({
        "status": if result.cancelled { "cancelled" } else { "ok" },
        "converted": result.converted_count,
        "skipped": result.skipped_count,
        "errors": result.error_count,
        "error_details": result.error_details,
        "archive_folder": result.archive_folder,
        "manifest": result.manifest_path,
        "outcomes": result.outcomes,
    })
}

pub fn image_summary(result: &ImageBatchResult) -> String {
    match (&result.output_path, &result.error) {
        (Some(path), _) if result.success => format!(
            "Created {} ({} page{})",
            path.display(),
            result.page_count,
            if result.page_count == 1 { "" } else { "s" }
        ),
        (_, Some(error)) => format!("Image conversion failed: {error}"),
        _ => "Image conversion failed".to_string(),
    }
}

pub fn restore_summary(report: &RestoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Restored: {}", report.restored.len());
    let _ = writeln!(out, "Skipped: {}", report.skipped.len());
    let _ = writeln!(out, "Errors: {}", report.errors.len());
    for line in report.skipped.iter().chain(&report.errors) {
        let _ = writeln!(out, "  - {line}");
    }
    out
}

/// Output path for the image command, with `.pdf` appended when missing.
pub fn pdf_output_path(raw: &Path) -> PathBuf {
    let is_pdf = raw
        .extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf {
        return raw.to_path_buf();
    }
    let mut name = raw.as_os_str().to_os_string();
    name.push(".pdf");
    PathBuf::from(name)
}
