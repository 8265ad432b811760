//! Global error handling for dirscan
//!
//! Each stage owns a narrow error type (`NavigationError`,
//! `ClassificationError`, `ExportError`); this module folds the ones that can
//! end a run into a single error the orchestrator and the binary report.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::export::ExportError;
use crate::navigator::NavigationError;
use crate::types::{AbortReason, ScanRun};

/// Global error type for dirscan operations
#[derive(Error, Debug)]
pub enum DirScanError {
    /// Navigation failed in a way the browser cannot recover from
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// The confirmed root could not be listed when the scan started
    #[error("Cannot read directory {}: {source}", .path.display())]
    RootUnreadable {
        /// Root that was requested
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// The scan stopped early; the records gathered so far are kept
    #[error(
        "Scan of {} aborted ({reason}) after {} of its files",
        .partial.root().display(),
        .partial.records().len()
    )]
    ScanAborted {
        /// Why the scan stopped
        reason: AbortReason,
        /// Partial, frozen run
        partial: Box<ScanRun>,
    },

    /// Requested output format is not one of the supported identifiers
    #[error("Unsupported format '{0}' (expected one of: txt, json, csv, pdf, epub)")]
    UnsupportedFormat(String),

    /// An exporter failed to produce the destination file
    #[error("Could not write {}: {source}", .path.display())]
    Export {
        /// Destination that was requested
        path: PathBuf,
        /// Exporter failure
        #[source]
        source: ExportError,
    },

    /// The destination exists and overwriting was not allowed
    #[error("Output file {} already exists (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),

    /// A scan was requested before a directory was confirmed
    #[error("No directory has been confirmed for scanning")]
    NotConfirmed,

    /// Another scan/export sequence is still running
    #[error("A scan is already in progress")]
    RunInProgress,

    /// File system and terminal errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DirScanError {
    /// True when the run ended because the user asked it to
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            DirScanError::ScanAborted {
                reason: AbortReason::Cancelled,
                ..
            }
        )
    }
}

/// Specialized Result type for dirscan operations
pub type Result<T> = std::result::Result<T, DirScanError>;

/// Creates a DirScanError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::DirScanError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}
