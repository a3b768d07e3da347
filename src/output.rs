//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Each file leads with its positional index and name; sizes, outcomes and
//! object keys are indented context lines beneath it.
//!
//! # Output Format
//!
//! ## Compress
//!
//! ```text
//! 001 front.heic → front.jpg
//!     Size: 2.4 MB → 78.1 KB
//!     Result: compressed (3 attempts, quality 56%, 1920×1440)
//! ```
//!
//! ## Upload
//!
//! ```text
//! Uploading 2 photos
//!     001 front.heic
//!         Key: cars/user-42/1700000000-00-9f86d081-front.jpg
//!         Size: 2.4 MB → 78.1 KB (compressed)
//!     002 brochure.pdf
//!         Failed: brochure.pdf is not an image (media type "application/pdf")
//! Uploaded 1 of 2 photos, 1 failed
//! ```
//!
//! ## Delete / Orphans
//!
//! ```text
//! Deleted 3, already gone 1, failed 0
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::imaging::{NormalizeOutcome, Normalized};
use crate::upload::{DeleteReport, UploadEvent, UploadReport};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 0-based position as a 1-based, 3-digit zero-padded index.
fn format_index(index: usize) -> String {
    format!("{:0>3}", index + 1)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

/// Human-readable byte size, 1 KB = 1024 bytes.
///
/// ```text
/// 512      → 512 B
/// 80_000   → 78.1 KB
/// 2_500_000 → 2.4 MB
/// ```
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / MB)
    }
}

/// One-line description of how a file was normalized.
pub fn format_outcome(outcome: &NormalizeOutcome) -> String {
    match outcome {
        NormalizeOutcome::AlreadyWithinBand => "within band, unchanged".to_string(),
        NormalizeOutcome::Compressed {
            attempts,
            quality,
            dimensions,
        }
        | NormalizeOutcome::BestEffort {
            attempts,
            quality,
            dimensions,
        } => format!(
            "{} ({}, quality {}%, {}×{})",
            outcome.label(),
            plural(*attempts as usize, "attempt", "attempts"),
            quality.to_percent(),
            dimensions.width,
            dimensions.height
        ),
        NormalizeOutcome::Unchanged { attempts } => format!(
            "unchanged, no closer candidate in {}",
            plural(*attempts as usize, "attempt", "attempts")
        ),
        NormalizeOutcome::Fallback { reason, .. } => format!("original kept: {}", reason),
    }
}

// ============================================================================
// Compress
// ============================================================================

/// Format the result of normalizing one local file. `output_path` is where
/// it was written, relative to the output directory.
pub fn format_normalize_result(
    index: usize,
    input_name: &str,
    input_size: u64,
    output_path: &str,
    result: &Normalized,
) -> Vec<String> {
    vec![
        format!("{} {} → {}", format_index(index), input_name, output_path),
        format!(
            "{}Size: {} → {}",
            indent(1),
            format_size(input_size),
            format_size(result.file.size())
        ),
        format!("{}Result: {}", indent(1), format_outcome(&result.outcome)),
    ]
}

pub fn print_normalize_result(
    index: usize,
    input_name: &str,
    input_size: u64,
    output_path: &str,
    result: &Normalized,
) {
    for line in format_normalize_result(index, input_name, input_size, output_path, result) {
        println!("{}", line);
    }
}

// ============================================================================
// Upload
// ============================================================================

/// Format a single upload progress event as display lines.
pub fn format_upload_event(event: &UploadEvent) -> Vec<String> {
    match event {
        UploadEvent::Started { total } => {
            vec![format!("Uploading {}", plural(*total, "photo", "photos"))]
        }
        UploadEvent::FileUploaded {
            index,
            name,
            key,
            original_size,
            stored_size,
            outcome,
        } => vec![
            format!("{}{} {}", indent(1), format_index(*index), name),
            format!("{}Key: {}", indent(2), key),
            format!(
                "{}Size: {} → {} ({})",
                indent(2),
                format_size(*original_size),
                format_size(*stored_size),
                outcome.label()
            ),
        ],
        UploadEvent::FileFailed {
            index,
            name,
            reason,
        } => vec![
            format!("{}{} {}", indent(1), format_index(*index), name),
            format!("{}Failed: {}", indent(2), reason),
        ],
    }
}

/// Summary line plus the stored keys in input order.
pub fn format_upload_report(report: &UploadReport) -> Vec<String> {
    let total = report.uploaded.len() + report.failures.len();
    let mut summary = format!(
        "Uploaded {} of {}",
        report.uploaded.len(),
        plural(total, "photo", "photos")
    );
    if !report.failures.is_empty() {
        summary.push_str(&format!(", {} failed", report.failures.len()));
    }
    let mut lines = vec![summary];
    if !report.uploaded.is_empty() {
        lines.push("Keys".to_string());
        for uploaded in &report.uploaded {
            lines.push(format!("{}{}", indent(1), uploaded.key));
        }
    }
    lines
}

pub fn print_upload_report(report: &UploadReport) {
    for line in format_upload_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Delete / orphans
// ============================================================================

pub fn format_delete_report(report: &DeleteReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Deleted {}, already gone {}, failed {}",
        report.deleted.len(),
        report.missing.len(),
        report.failures.len()
    )];
    for failure in &report.failures {
        lines.push(format!("{}{}: {}", indent(1), failure.key, failure.reason));
    }
    lines
}

pub fn print_delete_report(report: &DeleteReport) {
    for line in format_delete_report(report) {
        println!("{}", line);
    }
}

pub fn format_orphans(orphans: &[String]) -> Vec<String> {
    if orphans.is_empty() {
        return vec!["No orphaned objects".to_string()];
    }
    let mut lines = vec![plural(orphans.len(), "orphaned object", "orphaned objects")];
    lines.extend(orphans.iter().map(|key| format!("{}{}", indent(1), key)));
    lines
}

pub fn print_orphans(orphans: &[String]) {
    for line in format_orphans(orphans) {
        println!("{}", line);
    }
}
