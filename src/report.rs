/*!
 * Run summaries
 *
 * Renders the outcome of a scan/export sequence as console tables using the
 * tabled library.
 */

use std::path::PathBuf;
use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::export::{Compression, ReportFormat};
use crate::types::{RecordStatus, ScanRun};
use crate::utils::{format_count, format_file_size, shorten_path};

/// Number of largest files listed under the summary
const LARGEST_FILES: usize = 10;

/// One row of the largest-files table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    /// Path relative to the scan root
    pub path: String,
    /// Classification outcome
    pub status: RecordStatus,
    /// Size on disk
    pub size_bytes: u64,
}

/// Outcome of one successful scan/export sequence
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Report file that was written
    pub output_file: PathBuf,
    /// Format of the report
    pub format: ReportFormat,
    /// Compression applied to the report file
    pub compression: Compression,
    /// Time taken to scan and export
    pub duration: Duration,
    /// Files the scanner considered
    pub files_considered: usize,
    /// Text files whose content was included
    pub files_included: usize,
    /// Binary files skipped
    pub skipped_non_text: usize,
    /// Files that could not be read
    pub errors: usize,
    /// Text files cut at the content cap
    pub truncated: usize,
    /// Combined size of all considered files
    pub total_bytes: u64,
    /// Largest considered files, biggest first
    pub largest_files: Vec<FileSummary>,
}

impl RunSummary {
    /// Summarize an exported run
    pub fn new(
        run: &ScanRun,
        output_file: PathBuf,
        format: ReportFormat,
        duration: Duration,
    ) -> Self {
        let mut largest_files: Vec<FileSummary> = run
            .records()
            .iter()
            .map(|record| FileSummary {
                path: run.display_path(record),
                status: record.status(),
                size_bytes: record.size_bytes,
            })
            .collect();
        largest_files.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| a.path.cmp(&b.path))
        });
        largest_files.truncate(LARGEST_FILES);

        Self {
            output_file,
            format,
            compression: Compression::None,
            duration,
            files_considered: run.total_files_considered(),
            files_included: run.total_files_included(),
            skipped_non_text: run.skipped_non_text(),
            errors: run.total_errors(),
            truncated: run.truncated_count(),
            total_bytes: run.total_bytes(),
            largest_files,
        }
    }

    /// Record the compression the report was written with
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Format name, with the compression when there is one
    pub fn format_label(&self) -> String {
        match self.compression {
            Compression::None => self.format.to_string(),
            compression => format!("{} ({})", self.format, compression),
        }
    }
}

/// Report generator for run summaries
#[derive(Debug, Default, Clone, Copy)]
pub struct Reporter;

impl Reporter {
    /// Create a new reporter
    pub fn new() -> Self {
        Self
    }

    /// Generate the summary as a string
    pub fn generate_report(&self, summary: &RunSummary) -> String {
        let summary_table = self.create_summary_table(summary);

        if summary.largest_files.is_empty() {
            return format!("✅  SCAN COMPLETE\n{}", summary_table);
        }

        let files_title = if summary.files_considered > LARGEST_FILES {
            format!("📋  TOP {} LARGEST FILES", LARGEST_FILES)
        } else {
            "📋  SCANNED FILES".to_string()
        };

        format!(
            "{}\n{}\n\n✅  SCAN COMPLETE\n{}",
            files_title,
            self.create_files_table(summary),
            summary_table
        )
    }

    /// Print the summary to stdout
    pub fn print_report(&self, summary: &RunSummary) {
        println!("\n{}", self.generate_report(summary));
    }

    fn create_summary_table(&self, summary: &RunSummary) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: &'static str,

            #[tabled(rename = "Value")]
            value: String,
        }

        let rows = vec![
            SummaryRow {
                key: "📂 Output File",
                value: summary.output_file.display().to_string(),
            },
            SummaryRow {
                key: "🧾 Format",
                value: summary.format_label(),
            },
            SummaryRow {
                key: "⏱️ Process Time",
                value: format!("{:.4?}", summary.duration),
            },
            SummaryRow {
                key: "📄 Files Considered",
                value: format_count(summary.files_considered),
            },
            SummaryRow {
                key: "📝 Text Included",
                value: format_count(summary.files_included),
            },
            SummaryRow {
                key: "📦 Binary Skipped",
                value: format_count(summary.skipped_non_text),
            },
            SummaryRow {
                key: "⚠️ Unreadable",
                value: format_count(summary.errors),
            },
            SummaryRow {
                key: "✂️ Truncated",
                value: format_count(summary.truncated),
            },
            SummaryRow {
                key: "💾 Total Size",
                value: format_file_size(summary.total_bytes),
            },
        ];

        style(Table::new(rows))
    }

    fn create_files_table(&self, summary: &RunSummary) -> String {
        #[derive(Tabled)]
        struct FileRow {
            #[tabled(rename = "File Path")]
            path: String,

            #[tabled(rename = "Status")]
            status: RecordStatus,

            #[tabled(rename = "Size")]
            size: String,
        }

        let rows: Vec<FileRow> = summary
            .largest_files
            .iter()
            .map(|file| FileRow {
                path: shorten_path(&file.path, 60),
                status: file.status,
                size: format_file_size(file.size_bytes),
            })
            .collect();

        style(Table::new(rows))
    }
}

fn style(mut table: Table) -> String {
    table
        .with(Style::rounded())
        .with(Padding::new(1, 1, 0, 0))
        .with(Modify::new(Columns::new(..)).with(Alignment::left()));
    table.to_string()
}
