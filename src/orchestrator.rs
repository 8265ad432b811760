/*!
 * End-to-end run driver
 *
 * Navigator → output choice → Scanner → exporter, one sequence at a time.
 * The orchestrator never draws anything itself; a `Frontend` supplies
 * navigation events and answers and receives progress.
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{DirScanError, Result};
use crate::export::{Compression, Exporter, ReportFormat};
use crate::navigator::{
    transition, Browser, ListingSource, NavEvent, NavigationError, NavigatorState,
};
use crate::progress::{CancelFlag, ProgressSink};
use crate::report::RunSummary;
use crate::scanner::{ScanOptions, Scanner};

/// Base name of the report when none is given
pub const DEFAULT_REPORT_NAME: &str = "scan_results";

/// Where and how the report should be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChoice {
    /// Format identifier as typed or selected (`txt`, `json`, ...)
    pub format: String,
    /// Directory the report goes into
    pub directory: PathBuf,
    /// File name, with or without the format extension
    pub file_name: String,
    /// Compression applied to the report
    pub compression: Compression,
}

impl OutputChoice {
    /// Full destination path, with the format and compression extensions
    /// appended if missing
    pub fn destination(&self, format: ReportFormat) -> PathBuf {
        let name = if self.file_name.trim().is_empty() {
            DEFAULT_REPORT_NAME
        } else {
            self.file_name.trim()
        };
        self.compression
            .destination(format, &self.directory.join(name))
    }
}

/// Interactive surface driven by the orchestrator
pub trait Frontend: ProgressSink {
    /// Wait for the next navigation event while browsing
    fn next_event(&mut self, browser: &Browser) -> Result<NavEvent>;

    /// Ask for format, compression, directory and file name; `None` cancels
    /// the run
    fn choose_output(
        &mut self,
        root: &Path,
        default_format: ReportFormat,
        default_compression: Compression,
    ) -> Result<Option<OutputChoice>>;

    /// Ask whether an existing destination may be replaced
    fn confirm_overwrite(&mut self, destination: &Path) -> Result<bool>;

    /// Show a recoverable navigation problem
    fn navigation_error(&mut self, _error: &NavigationError) {}
}

/// How an interactive run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The report was written
    Exported(RunSummary),
    /// The user backed out before anything was written
    Cancelled,
}

/// Releases the busy flag when a run ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| DirScanError::RunInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives one run of the pipeline at a time
#[derive(Debug)]
pub struct Orchestrator {
    config: Config,
    cancel: CancelFlag,
    busy: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator for the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancelFlag::new(),
            busy: AtomicBool::new(false),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag a front end can raise to stop the running scan
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Browse until the user confirms or cancels
    pub fn navigate<F: Frontend + ?Sized>(
        &self,
        frontend: &mut F,
        source: &dyn ListingSource,
    ) -> Result<NavigatorState> {
        let mut state =
            NavigatorState::start(&self.config.start_dir, self.config.show_hidden, source)?;

        while let Some(browser) = state.browser() {
            let event = frontend.next_event(browser)?;
            let step = transition(state, event, source);
            if let Some(error) = &step.error {
                warn!("{}", error);
                frontend.navigation_error(error);
            }
            state = step.state;
        }

        Ok(state)
    }

    /// Run the whole interactive sequence through `frontend`
    pub fn run<F: Frontend>(
        &self,
        frontend: &mut F,
        source: &dyn ListingSource,
    ) -> Result<RunOutcome> {
        let state = self.navigate(frontend, source)?;
        let root = match state.confirmed_root() {
            Some(root) => root.to_path_buf(),
            None => {
                info!("Navigation cancelled");
                return Ok(RunOutcome::Cancelled);
            }
        };

        let config = &self.config;
        let answer = frontend.choose_output(&root, config.default_format, config.compression)?;
        let choice = match answer {
            Some(choice) => choice,
            None => return Ok(RunOutcome::Cancelled),
        };
        let format = ReportFormat::from_identifier(&choice.format)?;
        let destination = choice.destination(format);
        let exporter = choice
            .compression
            .wrap(format.exporter(), config.compression_level);

        if destination.exists()
            && !config.force
            && !frontend.confirm_overwrite(&destination)?
        {
            info!("Not overwriting {}", destination.display());
            return Ok(RunOutcome::Cancelled);
        }

        let summary = self.scan_and_export(&state, exporter.as_ref(), &destination, frontend)?;
        Ok(RunOutcome::Exported(summary))
    }

    /// Scan the confirmed directory and export it to `destination`.
    ///
    /// Refuses to start unless `state` is `Confirmed`, the destination passes
    /// the exporter's checks and no other run is in progress. An incomplete
    /// scan is returned as `ScanAborted` and nothing is written.
    pub fn scan_and_export(
        &self,
        state: &NavigatorState,
        exporter: &dyn Exporter,
        destination: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunSummary> {
        let root = state.confirmed_root().ok_or(DirScanError::NotConfirmed)?;
        let export_error = |source| DirScanError::Export {
            path: destination.to_path_buf(),
            source,
        };
        exporter.validate(destination).map_err(export_error)?;

        let _busy = BusyGuard::acquire(&self.busy)?;
        self.cancel.reset();

        let start = Instant::now();
        let mut options = ScanOptions::from_config(&self.config);
        options.skip_paths.push(absolute(destination));

        let run = Scanner::new(options).scan(root, progress, &self.cancel)?;
        if let Some(reason) = run.abort_reason() {
            return Err(DirScanError::ScanAborted {
                reason,
                partial: Box::new(run),
            });
        }

        exporter.export(&run, destination).map_err(export_error)?;

        let format = exporter.format();
        let summary = RunSummary::new(&run, destination.to_path_buf(), format, start.elapsed())
            .with_compression(exporter.compression());
        info!(
            "Wrote {} report for {} files to {}",
            format,
            summary.files_considered,
            destination.display()
        );
        Ok(summary)
    }
}

/// Best-effort absolute form of a path that may not exist yet
fn absolute(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (std::fs::canonicalize(parent), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_appends_extension() {
        let choice = OutputChoice {
            format: "json".to_string(),
            directory: PathBuf::from("/out"),
            file_name: "report".to_string(),
            compression: Compression::None,
        };
        assert_eq!(
            choice.destination(ReportFormat::Json),
            PathBuf::from("/out/report.json")
        );

        let blank = OutputChoice {
            file_name: "  ".to_string(),
            ..choice.clone()
        };
        assert_eq!(
            blank.destination(ReportFormat::Csv),
            PathBuf::from("/out/scan_results.csv")
        );

        let gzipped = OutputChoice {
            compression: Compression::Gzip,
            ..choice
        };
        assert_eq!(
            gzipped.destination(ReportFormat::Json),
            PathBuf::from("/out/report.json.gz")
        );
    }

    #[test]
    fn test_scan_requires_confirmation() {
        let orchestrator = Orchestrator::new(Config::default());
        let result = orchestrator.scan_and_export(
            &NavigatorState::Cancelled,
            ReportFormat::Txt.exporter().as_ref(),
            Path::new("out.txt"),
            &mut crate::progress::NoProgress,
        );
        assert!(matches!(result, Err(DirScanError::NotConfirmed)));
    }

    #[test]
    fn test_bad_destination_is_rejected_before_scanning() -> std::io::Result<()> {
        let src = tempfile::tempdir()?;
        std::fs::write(src.path().join("a.txt"), "a")?;
        let state = NavigatorState::Confirmed(src.path().to_path_buf());
        let orchestrator = Orchestrator::new(Config::default());

        let mut reports = 0;
        let mut sink = |_current: usize, _total: usize| reports += 1;
        let result = orchestrator.scan_and_export(
            &state,
            ReportFormat::Json.exporter().as_ref(),
            &src.path().join("no-such-dir").join("out.json"),
            &mut sink,
        );

        assert!(matches!(
            result,
            Err(DirScanError::Export {
                source: crate::export::ExportError::MissingDirectory(_),
                ..
            })
        ));
        assert_eq!(reports, 0);
        Ok(())
    }

    #[test]
    fn test_busy_guard_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        {
            let _first = BusyGuard::acquire(&flag).unwrap();
            assert!(matches!(
                BusyGuard::acquire(&flag),
                Err(DirScanError::RunInProgress)
            ));
        }
        assert!(BusyGuard::acquire(&flag).is_ok());
    }
}
