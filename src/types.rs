/*!
 * Core types shared by the scanner and every exporter
 *
 * A `ScanRun` is the report model: run metadata plus the ordered list of
 * `ScanRecord`s. It is assembled by the scanner through `ScanRunBuilder` and
 * has no mutating API once finished, so exporters only ever see a frozen run.
 */

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::classifier::ClassificationError;

/// Outcome of classifying one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Text file; content is present
    Text,
    /// Binary file; content was skipped
    Binary,
    /// File could not be read
    Error,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordStatus::Text => "text",
            RecordStatus::Binary => "binary",
            RecordStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// One file visited by the scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Path of the file as it was visited (root joined with the relative path)
    pub path: PathBuf,
    /// Size reported by the file system, in bytes
    pub size_bytes: u64,
    /// Last modification time, when the platform reports one
    pub modified: Option<DateTime<Local>>,
    /// Lower-cased extension without the dot
    pub extension: Option<String>,
    /// Name starts with a dot
    pub hidden: bool,
    /// Classified as text
    pub is_text: bool,
    /// Decoded content, capped at the configured size; only set for text files
    pub content: Option<String>,
    /// Content holds only the leading bytes of the file
    pub truncated: bool,
    /// Content was skipped because the file is not text
    pub skipped: bool,
    /// Why the file could not be read
    pub error: Option<ClassificationError>,
}

impl ScanRecord {
    /// Classification outcome of this record
    pub fn status(&self) -> RecordStatus {
        if self.error.is_some() {
            RecordStatus::Error
        } else if self.is_text {
            RecordStatus::Text
        } else {
            RecordStatus::Binary
        }
    }

    /// Marker exporters print in place of missing content
    pub fn placeholder(&self) -> Option<String> {
        match (&self.error, self.is_text) {
            (Some(err), _) => Some(format!("[unreadable: {}]", err)),
            (None, false) => Some("[binary file skipped]".to_string()),
            (None, true) => None,
        }
    }

    /// Content for text files, the placeholder marker otherwise
    pub fn content_or_placeholder(&self) -> Cow<'_, str> {
        match &self.content {
            Some(content) => Cow::Borrowed(content.as_str()),
            None => Cow::Owned(self.placeholder().unwrap_or_default()),
        }
    }

    /// File name component as a displayable string
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// Why a scan ended before visiting every file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The caller raised the cancellation flag
    Cancelled,
    /// The scan root disappeared while the scan was running
    RootRemoved,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cancelled => f.write_str("cancelled by user"),
            AbortReason::RootRemoved => f.write_str("scan root was removed"),
        }
    }
}

/// A finished scan: metadata plus records in traversal order
#[derive(Debug, Clone)]
pub struct ScanRun {
    root: PathBuf,
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
    max_content_bytes: usize,
    recursive: bool,
    records: Vec<ScanRecord>,
    total_files_included: usize,
    total_errors: usize,
    skipped_non_text: usize,
    abort_reason: Option<AbortReason>,
    unreadable_directories: Vec<PathBuf>,
}

impl ScanRun {
    /// Directory that was scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// When the scan started
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// When the scan stopped
    pub fn finished_at(&self) -> DateTime<Local> {
        self.finished_at
    }

    /// Content cap the classifier used
    pub fn max_content_bytes(&self) -> usize {
        self.max_content_bytes
    }

    /// Whether sub-directories were walked
    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Records in traversal order
    pub fn records(&self) -> &[ScanRecord] {
        &self.records
    }

    /// Number of files the scanner considered
    pub fn total_files_considered(&self) -> usize {
        self.records.len()
    }

    /// Number of text files whose content was included
    pub fn total_files_included(&self) -> usize {
        self.total_files_included
    }

    /// Number of files that could not be read
    pub fn total_errors(&self) -> usize {
        self.total_errors
    }

    /// Number of readable files skipped as binary
    pub fn skipped_non_text(&self) -> usize {
        self.skipped_non_text
    }

    /// Number of text records holding only a prefix of their file
    pub fn truncated_count(&self) -> usize {
        self.records.iter().filter(|r| r.truncated).count()
    }

    /// Sum of the sizes of every considered file
    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.size_bytes).sum()
    }

    /// True when the scan stopped before visiting every file
    pub fn is_incomplete(&self) -> bool {
        self.abort_reason.is_some()
    }

    /// Why the scan stopped early, if it did
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason
    }

    /// Sub-directories that could not be listed during a recursive walk
    pub fn unreadable_directories(&self) -> &[PathBuf] {
        &self.unreadable_directories
    }

    /// Path of a record relative to the scan root, for display
    pub fn display_path(&self, record: &ScanRecord) -> String {
        record
            .path
            .strip_prefix(&self.root)
            .unwrap_or(&record.path)
            .to_string_lossy()
            .to_string()
    }
}

/// Accumulates records while a scan is running
#[derive(Debug)]
pub(crate) struct ScanRunBuilder {
    run: ScanRun,
}

impl ScanRunBuilder {
    pub(crate) fn new(root: PathBuf, max_content_bytes: usize, recursive: bool) -> Self {
        let now = Local::now();
        Self {
            run: ScanRun {
                root,
                started_at: now,
                finished_at: now,
                max_content_bytes,
                recursive,
                records: Vec::new(),
                total_files_included: 0,
                total_errors: 0,
                skipped_non_text: 0,
                abort_reason: None,
                unreadable_directories: Vec::new(),
            },
        }
    }

    /// Append a record and update the counters
    pub(crate) fn push(&mut self, record: ScanRecord) {
        match record.status() {
            RecordStatus::Text => self.run.total_files_included += 1,
            RecordStatus::Binary => self.run.skipped_non_text += 1,
            RecordStatus::Error => self.run.total_errors += 1,
        }
        self.run.records.push(record);
    }

    pub(crate) fn note_unreadable_directory(&mut self, path: PathBuf) {
        self.run.unreadable_directories.push(path);
    }

    /// Freeze a run that visited every file
    pub(crate) fn finish(mut self) -> ScanRun {
        self.run.finished_at = Local::now();
        self.run
    }

    /// Freeze a run that stopped early
    pub(crate) fn abort(mut self, reason: AbortReason) -> ScanRun {
        self.run.abort_reason = Some(reason);
        self.finish()
    }
}
