//! CSV report: a header row, then one row per file in traversal order.
//! The `path` column holds the full path of each file.

use std::fs::File;
use std::io::BufWriter;

use super::{char_count, line_count, ExportError, Exporter, ReportFormat};
use crate::types::ScanRun;

/// Column names, in order
pub const CSV_COLUMNS: [&str; 11] = [
    "path",
    "status",
    "size_bytes",
    "truncated",
    "extension",
    "hidden",
    "modified",
    "line_count",
    "char_count",
    "error",
    "content",
];

/// Writes `.csv` reports
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Csv
    }

    fn write_report(&self, run: &ScanRun, out: &mut File) -> Result<(), ExportError> {
        let mut w = ::csv::Writer::from_writer(BufWriter::new(out));
        w.write_record(CSV_COLUMNS)?;

        for record in run.records() {
            let modified = record
                .modified
                .map(|m| m.to_rfc3339())
                .unwrap_or_default();
            let error = record
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();

            w.write_record([
                record.path.display().to_string(),
                record.status().to_string(),
                record.size_bytes.to_string(),
                record.truncated.to_string(),
                record.extension.clone().unwrap_or_default(),
                record.hidden.to_string(),
                modified,
                line_count(record).to_string(),
                char_count(record).to_string(),
                error,
                record.content_or_placeholder().into_owned(),
            ])?;
        }

        w.flush()?;
        Ok(())
    }
}
