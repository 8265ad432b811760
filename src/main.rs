/*!
 * Command-line interface for dirscan
 */

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use dirscan::config::{Args, Config};
use dirscan::error::{DirScanError, Result};
use dirscan::logging::{self, LogTarget, Verbosity};
use dirscan::navigator::{FsListingSource, NavigatorState};
use dirscan::orchestrator::{Orchestrator, RunOutcome, DEFAULT_REPORT_NAME};
use dirscan::report::Reporter;
use dirscan::tui::TerminalUi;

/// Exit status when the user cancelled a scan
const EXIT_CANCELLED: u8 = 130;

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(shell) = args.generate {
        let mut cmd = Args::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_cancellation() => {
            eprintln!("Cancelled: {}", err);
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let verbosity = Verbosity::from_flags(args.verbose, args.quiet);
    let target = match (&args.log_file, &args.scan) {
        (Some(path), _) => LogTarget::File(path.clone()),
        (None, Some(_)) => LogTarget::Stderr,
        // nothing may write over the terminal UI
        (None, None) if args.print_config => LogTarget::Stderr,
        (None, None) => LogTarget::Disabled,
    };
    logging::init(verbosity, target)?;

    let config = Config::from_args(&args)?;
    debug!("Effective configuration: {:?}", config);

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    config.validate()?;

    match config.scan_dir.clone() {
        Some(dir) => run_direct(config, dir),
        None => run_interactive(config),
    }
}

/// Scan one directory without the browser
fn run_direct(config: Config, dir: PathBuf) -> Result<()> {
    let format = config.default_format;
    let requested = config
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_NAME));
    let destination = config.compression.destination(format, &requested);
    let exporter = config
        .compression
        .wrap(format.exporter(), config.compression_level);
    if destination.exists() && !config.force {
        return Err(DirScanError::OutputExists(destination));
    }

    let state = NavigatorState::confirm_path(&dir, &FsListingSource)?;

    // Create progress bar with advanced Unicode styling
    let progress = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold.cyan} {wide_bar:.cyan/blue} {pos}/{len} ({percent}%) ⏱️  Elapsed: {elapsed_precise}  Remaining: {eta_precise}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_prefix("📊 Scanning");

    let orchestrator = Orchestrator::new(config);
    let mut sink = progress.clone();
    let result = orchestrator.scan_and_export(&state, exporter.as_ref(), &destination, &mut sink);
    progress.finish_and_clear();

    Reporter::new().print_report(&result?);
    Ok(())
}

/// Browse, choose the output, scan and export through the terminal UI
fn run_interactive(config: Config) -> Result<()> {
    let orchestrator = Orchestrator::new(config);

    let outcome = {
        let mut ui = TerminalUi::new(orchestrator.cancel_flag())?;
        orchestrator.run(&mut ui, &FsListingSource)
        // the terminal is restored here, before anything is printed
    };

    match outcome? {
        RunOutcome::Exported(summary) => Reporter::new().print_report(&summary),
        RunOutcome::Cancelled => println!("Nothing was scanned."),
    }
    Ok(())
}
