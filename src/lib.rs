/*!
 * dirscan - Browse to a directory, scan its text files and export one report
 *
 * The pipeline is Navigator → Scanner → report model → exporter, driven by
 * the `Orchestrator`. Text files are read up to a size cap; binary and
 * unreadable files are recorded with a placeholder instead of content.
 */

pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod navigator;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod tui;
pub mod types;
pub mod utils;


// Re-export main components for easier access
pub use classifier::{Classification, ClassificationError, Classifier};
pub use config::Config;
pub use error::{DirScanError, Result};
pub use export::{Compression, ExportError, Exporter, ReportFormat};
pub use navigator::{transition, NavEvent, NavigationError, NavigatorState};
pub use orchestrator::{Frontend, Orchestrator, OutputChoice, RunOutcome};
pub use progress::{CancelFlag, NoProgress, ProgressSink, ProgressState};
pub use report::{Reporter, RunSummary};
pub use scanner::{ScanOptions, Scanner};
pub use types::{AbortReason, RecordStatus, ScanRecord, ScanRun};
pub use utils::format_file_size;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
