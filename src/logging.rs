//! Tracing subscriber initialization for the dirscan binary.
//!
//! # Priority (highest to lowest)
//!
//! 1. `DIRSCAN_LOG` env var (per-target directives, e.g. `dirscan=debug,warn`)
//! 2. `RUST_LOG` env var
//! 3. CLI flags (`-v` → debug, `-vv` → trace, `-q` → error)
//! 4. Default level: `warn`

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::error::{DirScanError, Result};

/// Verbosity level derived from CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// `-q`: only errors.
    Quiet,
    /// Default: warnings and above.
    Normal,
    /// `-v`: debug-level output.
    Verbose,
    /// `-vv`: everything.
    Trace,
}

impl Verbosity {
    /// Determine verbosity from the parsed CLI flags.
    pub const fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (verbose, quiet) {
            (0, true) => Self::Quiet,
            (0, false) => Self::Normal,
            (1, _) => Self::Verbose,
            _ => Self::Trace,
        }
    }

    /// Map to a default `tracing::Level`.
    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Standard error, for direct mode
    Stderr,
    /// Appended to a file; the terminal stays untouched
    File(PathBuf),
    /// No subscriber at all, so nothing draws over the terminal UI
    Disabled,
}

/// Initialize the global tracing subscriber. Call once, early in `main`.
pub fn init(verbosity: Verbosity, target: LogTarget) -> Result<()> {
    let filter = build_env_filter(verbosity);

    let result = match target {
        LogTarget::Disabled => return Ok(()),
        LogTarget::Stderr => {
            let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(use_ansi)
                        .with_target(verbosity != Verbosity::Normal)
                        .without_time()
                        .compact(),
                )
                .try_init()
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| {
                    DirScanError::Config(format!(
                        "cannot open log file {}: {}",
                        path.display(),
                        err
                    ))
                })?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(true),
                )
                .try_init()
        }
    };

    result.map_err(|err| DirScanError::Config(format!("cannot initialise logging: {}", err)))
}

/// Build an `EnvFilter` respecting `DIRSCAN_LOG` > `RUST_LOG` > CLI verbosity.
fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    // An unparseable DIRSCAN_LOG falls through to RUST_LOG / default
    if let Ok(directives) = std::env::var("DIRSCAN_LOG") {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(verbosity.default_level().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(0, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(3, false), Verbosity::Trace);
    }

    #[test]
    fn default_levels() {
        assert_eq!(Verbosity::Normal.default_level(), Level::WARN);
        assert_eq!(Verbosity::Quiet.default_level(), Level::ERROR);
    }
}
