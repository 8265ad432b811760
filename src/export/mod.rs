/*!
 * Report exporters
 *
 * Every exporter turns a frozen `ScanRun` into one destination file. The
 * shared `Exporter::export` validates the destination, writes the report to a
 * temporary file next to it and renames it into place, so a failed export
 * never leaves a half-written report behind. The written file gets the mode
 * of the report it replaces, or 0644 when it is new.
 *
 * Any exporter can be wrapped by `CompressedExporter` to produce `.gz`,
 * `.bz2` or `.xz` output.
 */

mod compress;
mod csv;
mod epub;
mod json;
mod pdf;
mod txt;

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::debug;

use crate::error::{DirScanError, Result};
use crate::types::{ScanRecord, ScanRun};

pub use self::compress::{
    CompressedExporter, Compression, COMPRESSION_LEVELS, DEFAULT_COMPRESSION_LEVEL,
};
pub use self::csv::{CsvExporter, CSV_COLUMNS};
pub use self::epub::EpubExporter;
pub use self::json::JsonExporter;
pub use self::pdf::PdfExporter;
pub use self::txt::TxtExporter;

/// Failure while producing a report file
#[derive(Error, Debug)]
pub enum ExportError {
    /// Destination directory does not exist
    #[error("destination directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    /// Destination extension does not match the chosen format
    #[error("{} does not end in .{expected}", .path.display())]
    WrongExtension {
        /// Requested destination
        path: PathBuf,
        /// Extension the format requires
        expected: &'static str,
    },

    /// Writing or renaming failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization failed
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    /// PDF assembly failed
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// EPUB container could not be written
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Output formats a report can be exported to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    EnumString,
    Display,
    ValueEnum,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Plain text with one section per file
    #[default]
    Txt,
    /// Pretty-printed JSON document
    Json,
    /// One CSV row per file
    Csv,
    /// Paginated PDF document
    Pdf,
    /// EPUB 3 e-book with one chapter per file
    Epub,
}

impl ReportFormat {
    /// Every supported format, in menu order
    pub const ALL: [ReportFormat; 5] = [
        ReportFormat::Txt,
        ReportFormat::Json,
        ReportFormat::Csv,
        ReportFormat::Pdf,
        ReportFormat::Epub,
    ];

    /// Parse a user-supplied identifier such as `json`, `PDF` or `.csv`
    pub fn from_identifier(identifier: &str) -> Result<Self> {
        identifier
            .trim()
            .trim_start_matches('.')
            .parse()
            .map_err(|_| DirScanError::UnsupportedFormat(identifier.to_string()))
    }

    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Txt => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Pdf => "pdf",
            ReportFormat::Epub => "epub",
        }
    }

    /// Exporter that writes this format
    pub fn exporter(&self) -> Box<dyn Exporter> {
        match self {
            ReportFormat::Txt => Box::new(TxtExporter),
            ReportFormat::Json => Box::new(JsonExporter),
            ReportFormat::Csv => Box::new(CsvExporter),
            ReportFormat::Pdf => Box::new(PdfExporter::default()),
            ReportFormat::Epub => Box::new(EpubExporter),
        }
    }

    /// Next format in menu order, wrapping around
    pub fn next(&self) -> Self {
        let index = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    /// `path` with this format's extension appended when it has none
    pub fn with_extension(&self, path: &Path) -> PathBuf {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case(self.extension()) => path.to_path_buf(),
            _ => {
                let mut name = path.as_os_str().to_os_string();
                name.push(".");
                name.push(self.extension());
                PathBuf::from(name)
            }
        }
    }
}

/// Capability every output format implements
pub trait Exporter {
    /// Format this exporter produces
    fn format(&self) -> ReportFormat;

    /// Compression applied to the written file
    fn compression(&self) -> Compression {
        Compression::None
    }

    /// Serialize `run` into an open, empty file
    fn write_report(&self, run: &ScanRun, out: &mut File) -> std::result::Result<(), ExportError>;

    /// Check the destination before anything is written
    fn validate(&self, destination: &Path) -> std::result::Result<(), ExportError> {
        let parent = parent_dir(destination);
        if !parent.is_dir() {
            return Err(ExportError::MissingDirectory(parent.to_path_buf()));
        }

        let expected = self.format().extension();
        if !has_extension(destination, expected) {
            return Err(ExportError::WrongExtension {
                path: destination.to_path_buf(),
                expected,
            });
        }

        Ok(())
    }

    /// Validate, then write the report atomically to `destination`
    fn export(&self, run: &ScanRun, destination: &Path) -> std::result::Result<(), ExportError> {
        self.validate(destination)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".dirscan-")
            .suffix(".tmp")
            .tempfile_in(parent_dir(destination))?;
        debug!(
            "Writing {} report through {}",
            self.format(),
            temp.path().display()
        );

        // the temporary is removed on drop if anything below fails
        self.write_report(run, temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        match_permissions(temp.as_file(), destination)?;
        temp.persist(destination).map_err(|err| err.error)?;

        Ok(())
    }
}

/// Give the temporary file the mode of the report it replaces, or the usual
/// 0644 for a new report, instead of the owner-only mode it was created with
#[cfg(unix)]
fn match_permissions(file: &File, destination: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = match fs::metadata(destination) {
        Ok(existing) => existing.permissions().mode() & 0o7777,
        Err(_) => 0o644,
    };
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn match_permissions(file: &File, destination: &Path) -> io::Result<()> {
    match fs::metadata(destination) {
        Ok(existing) => file.set_permissions(existing.permissions()),
        Err(_) => Ok(()),
    }
}

/// Whether the last extension of `path` is `ext`, ignoring case
fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|found| found.eq_ignore_ascii_case(ext))
}

/// Directory a destination will be written into
fn parent_dir(destination: &Path) -> &Path {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Number of lines in a record's content
pub(crate) fn line_count(record: &ScanRecord) -> usize {
    record.content.as_deref().map_or(0, |c| c.lines().count())
}

/// Number of characters in a record's content
pub(crate) fn char_count(record: &ScanRecord) -> usize {
    record.content.as_deref().map_or(0, |c| c.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_identifiers() {
        assert_eq!(ReportFormat::from_identifier("json").unwrap(), ReportFormat::Json);
        assert_eq!(ReportFormat::from_identifier("PDF").unwrap(), ReportFormat::Pdf);
        assert_eq!(ReportFormat::from_identifier(".csv").unwrap(), ReportFormat::Csv);
        assert!(matches!(
            ReportFormat::from_identifier("docx"),
            Err(DirScanError::UnsupportedFormat(id)) if id == "docx"
        ));
        assert_eq!(ReportFormat::Epub.to_string(), "epub");
    }

    #[test]
    fn test_with_extension() {
        let fmt = ReportFormat::Json;
        assert_eq!(fmt.with_extension(Path::new("out")), PathBuf::from("out.json"));
        assert_eq!(fmt.with_extension(Path::new("out.JSON")), PathBuf::from("out.JSON"));
        assert_eq!(
            fmt.with_extension(Path::new("report.txt")),
            PathBuf::from("report.txt.json")
        );
    }

    #[test]
    fn test_format_cycle_wraps() {
        assert_eq!(ReportFormat::Txt.next(), ReportFormat::Json);
        assert_eq!(ReportFormat::Epub.next(), ReportFormat::Txt);
    }

    /// Writes part of a report, then fails
    struct FailingExporter;

    impl Exporter for FailingExporter {
        fn format(&self) -> ReportFormat {
            ReportFormat::Txt
        }

        fn write_report(
            &self,
            _run: &ScanRun,
            out: &mut File,
        ) -> std::result::Result<(), ExportError> {
            use std::io::Write;
            out.write_all(b"half a report")?;
            Err(ExportError::Io(io::Error::other("disk full")))
        }
    }

    fn empty_run(root: &Path) -> ScanRun {
        use crate::progress::{CancelFlag, NoProgress};
        use crate::scanner::{ScanOptions, Scanner};

        Scanner::new(ScanOptions::default())
            .scan(root, &mut NoProgress, &CancelFlag::new())
            .unwrap()
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let run = empty_run(src.path());

        let result = FailingExporter.export(&run, &out.path().join("report.txt"));
        assert!(matches!(result, Err(ExportError::Io(_))));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_write_keeps_previous_report() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let run = empty_run(src.path());
        let destination = out.path().join("report.txt");
        fs::write(&destination, "previous").unwrap();

        assert!(FailingExporter.export(&run, &destination).is_err());
        assert_eq!(fs::read_to_string(&destination).unwrap(), "previous");
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_validate_destination() {
        let dir = tempdir().unwrap();
        let exporter = ReportFormat::Csv.exporter();

        assert!(exporter.validate(&dir.path().join("ok.csv")).is_ok());
        assert!(matches!(
            exporter.validate(&dir.path().join("bad.txt")),
            Err(ExportError::WrongExtension { expected: "csv", .. })
        ));
        assert!(matches!(
            exporter.validate(&dir.path().join("missing").join("x.csv")),
            Err(ExportError::MissingDirectory(_))
        ));
    }
}
