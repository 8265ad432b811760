//! JSON report

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};

use chrono::{DateTime, Local};
use serde::Serialize;

use super::{char_count, line_count, ExportError, Exporter, ReportFormat};
use crate::classifier::ClassificationError;
use crate::types::{AbortReason, RecordStatus, ScanRun};

/// Writes `.json` reports
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExporter;

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: Metadata<'a>,
    files: Vec<FileEntry<'a>>,
}

#[derive(Serialize)]
struct Metadata<'a> {
    generated_at: DateTime<Local>,
    generator: &'static str,
    version: &'static str,
    hostname: String,
    root: String,
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
    recursive: bool,
    max_content_bytes: usize,
    total_files_considered: usize,
    total_files_included: usize,
    skipped_non_text: usize,
    total_errors: usize,
    truncated_files: usize,
    total_bytes: u64,
    incomplete: bool,
    abort_reason: Option<AbortReason>,
    unreadable_directories: Vec<String>,
    file_types: BTreeMap<String, usize>,
    size_distribution: BTreeMap<&'a str, usize>,
}

#[derive(Serialize)]
struct FileEntry<'a> {
    path: String,
    relative_path: String,
    name: String,
    status: RecordStatus,
    size_bytes: u64,
    modified: Option<DateTime<Local>>,
    extension: Option<&'a str>,
    hidden: bool,
    truncated: bool,
    line_count: usize,
    char_count: usize,
    content: Option<&'a str>,
    placeholder: Option<String>,
    error: Option<&'a ClassificationError>,
}

/// Bucket label for a file size
fn size_bucket(size: u64) -> &'static str {
    match size {
        0..=1_023 => "under_1kb",
        1_024..=102_399 => "1kb_to_100kb",
        102_400..=1_048_575 => "100kb_to_1mb",
        _ => "over_1mb",
    }
}

impl Exporter for JsonExporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Json
    }

    fn write_report(&self, run: &ScanRun, out: &mut File) -> Result<(), ExportError> {
        let mut file_types = BTreeMap::new();
        let mut size_distribution = BTreeMap::new();
        for record in run.records() {
            let ext = record
                .extension
                .clone()
                .unwrap_or_else(|| "(none)".to_string());
            *file_types.entry(ext).or_insert(0) += 1;
            *size_distribution.entry(size_bucket(record.size_bytes)).or_insert(0) += 1;
        }

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let report = JsonReport {
            metadata: Metadata {
                generated_at: Local::now(),
                generator: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
                hostname,
                root: run.root().display().to_string(),
                started_at: run.started_at(),
                finished_at: run.finished_at(),
                recursive: run.recursive(),
                max_content_bytes: run.max_content_bytes(),
                total_files_considered: run.total_files_considered(),
                total_files_included: run.total_files_included(),
                skipped_non_text: run.skipped_non_text(),
                total_errors: run.total_errors(),
                truncated_files: run.truncated_count(),
                total_bytes: run.total_bytes(),
                incomplete: run.is_incomplete(),
                abort_reason: run.abort_reason(),
                unreadable_directories: run
                    .unreadable_directories()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
                file_types,
                size_distribution,
            },
            files: run
                .records()
                .iter()
                .map(|record| FileEntry {
                    path: record.path.display().to_string(),
                    relative_path: run.display_path(record),
                    name: record.file_name(),
                    status: record.status(),
                    size_bytes: record.size_bytes,
                    modified: record.modified,
                    extension: record.extension.as_deref(),
                    hidden: record.hidden,
                    truncated: record.truncated,
                    line_count: line_count(record),
                    char_count: char_count(record),
                    content: record.content.as_deref(),
                    placeholder: record.placeholder(),
                    error: record.error.as_ref(),
                })
                .collect(),
        };

        let mut w = BufWriter::new(out);
        serde_json::to_writer_pretty(&mut w, &report)?;
        writeln!(w)?;
        w.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_buckets() {
        assert_eq!(size_bucket(0), "under_1kb");
        assert_eq!(size_bucket(1_024), "1kb_to_100kb");
        assert_eq!(size_bucket(200_000), "100kb_to_1mb");
        assert_eq!(size_bucket(5_000_000), "over_1mb");
    }
}
