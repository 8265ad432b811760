/*!
 * Configuration handling for dirscan
 *
 * Values come from three layers: command-line flags (and their `DIRSCAN_*`
 * environment variables), an optional TOML file, and built-in defaults, in
 * that order of precedence.
 */

use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use crate::classifier::DEFAULT_MAX_CONTENT_BYTES;
use crate::ensure;
use crate::error::{DirScanError, Result};
use crate::export::{Compression, ReportFormat, COMPRESSION_LEVELS, DEFAULT_COMPRESSION_LEVEL};

/// Command-line arguments for dirscan
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    name = "dirscan",
    version = env!("CARGO_PKG_VERSION"),
    about = "Browse to a directory, scan its text files and export a single report",
    long_about = "Opens an interactive directory browser in the terminal. Once a directory is confirmed, every text file in it is read (up to a size cap) and written into one consolidated report in txt, json, csv, pdf or epub format. Use --scan to skip the browser."
)]
pub struct Args {
    /// Directory the browser starts in (defaults to the current directory)
    pub start_dir: Option<PathBuf>,

    /// Scan this directory directly instead of opening the browser
    #[clap(short, long, value_name = "DIR")]
    pub scan: Option<PathBuf>,

    /// Report file to write (direct mode; defaults to ./scan_results.<ext>)
    #[clap(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Report format
    #[clap(short, long, value_enum, ignore_case = true, env = "DIRSCAN_DEFAULT_FORMAT")]
    pub format: Option<ReportFormat>,

    /// Maximum bytes of content kept per text file
    #[clap(long, value_name = "BYTES", env = "DIRSCAN_MAX_FILE_SIZE")]
    pub max_size: Option<usize>,

    /// Compress the report (gzip, bz2 or xz)
    #[clap(long, value_enum, ignore_case = true, value_name = "ALGORITHM")]
    pub compress: Option<Compression>,

    /// Compression level, 1 (fastest) to 9 (smallest)
    #[clap(long, value_name = "LEVEL", value_parser = clap::value_parser!(u32).range(1..=9))]
    pub compression_level: Option<u32>,

    /// Scan sub-directories too
    #[clap(short, long, overrides_with = "no_recursive")]
    pub recursive: bool,

    /// Only scan the directory's direct children
    #[clap(long, overrides_with = "recursive")]
    pub no_recursive: bool,

    /// Show and scan entries whose name starts with a dot
    #[clap(long, overrides_with = "no_hidden")]
    pub hidden: bool,

    /// Leave out entries whose name starts with a dot
    #[clap(long, overrides_with = "hidden")]
    pub no_hidden: bool,

    /// Comma-separated glob patterns of entry names to leave out
    #[clap(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Apply the built-in exclusion list (.git, node_modules, target, ...)
    #[clap(long, overrides_with = "no_default_excludes")]
    pub default_excludes: bool,

    /// Do not apply the built-in exclusion list
    #[clap(long, overrides_with = "default_excludes")]
    pub no_default_excludes: bool,

    /// Overwrite an existing report without asking
    #[clap(long, overrides_with = "no_force")]
    pub force: bool,

    /// Ask (or refuse) before overwriting an existing report
    #[clap(long, overrides_with = "force")]
    pub no_force: bool,

    /// Configuration file (defaults to <config dir>/dirscan/config.toml)
    #[clap(long, value_name = "FILE", env = "DIRSCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[clap(long)]
    pub print_config: bool,

    /// More log output (-v debug, -vv trace)
    #[clap(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors
    #[clap(short, long)]
    pub quiet: bool,

    /// Write logs to this file (the only log target in interactive mode)
    #[clap(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,
}

/// Contents of the optional TOML configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Directory the browser starts in
    pub start_dir: Option<PathBuf>,
    /// Maximum bytes of content kept per text file
    pub max_content_bytes: Option<usize>,
    /// Format preselected in the output form
    pub default_format: Option<ReportFormat>,
    /// Compression applied to reports
    pub compression: Option<Compression>,
    /// Compression level, 1 to 9
    pub compression_level: Option<u32>,
    /// Scan sub-directories
    pub recursive: Option<bool>,
    /// Show and scan hidden entries
    pub show_hidden: Option<bool>,
    /// Extra exclusion patterns
    pub exclude: Option<Vec<String>>,
    /// Apply the built-in exclusion list
    pub use_default_excludes: Option<bool>,
    /// Overwrite existing reports without asking
    pub force: Option<bool>,
}

impl FileConfig {
    /// Parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            DirScanError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        toml::from_str(&text)
            .map_err(|err| DirScanError::Config(format!("invalid {}: {}", path.display(), err)))
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dirscan").join("config.toml"))
    }

    /// Load the explicit file, or the default one when it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Directory the browser starts in
    pub start_dir: PathBuf,

    /// Directory to scan without browsing (direct mode)
    #[serde(skip)]
    pub scan_dir: Option<PathBuf>,

    /// Report destination (direct mode)
    #[serde(skip)]
    pub output: Option<PathBuf>,

    /// Maximum bytes of content kept per text file
    pub max_content_bytes: usize,

    /// Format used when none is chosen
    pub default_format: ReportFormat,

    /// Compression applied to reports
    pub compression: Compression,

    /// Compression level, 1 to 9
    pub compression_level: u32,

    /// Scan sub-directories
    pub recursive: bool,

    /// Show and scan hidden entries
    pub show_hidden: bool,

    /// Extra exclusion patterns
    #[serde(rename = "exclude")]
    pub exclude_patterns: Vec<String>,

    /// Apply the built-in exclusion list
    pub use_default_excludes: bool,

    /// Overwrite existing reports without asking
    pub force: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_dir: PathBuf::from("."),
            scan_dir: None,
            output: None,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            default_format: ReportFormat::Txt,
            compression: Compression::None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            recursive: false,
            show_hidden: false,
            exclude_patterns: Vec::new(),
            use_default_excludes: true,
            force: false,
        }
    }
}

impl Config {
    /// Build the configuration from arguments plus the configuration file
    pub fn from_args(args: &Args) -> Result<Self> {
        let file = FileConfig::discover(args.config.as_deref())?;
        Ok(Self::resolve(args, file))
    }

    /// Merge the layers: flags win over the file, the file over defaults
    pub fn resolve(args: &Args, file: FileConfig) -> Self {
        let defaults = Self::default();

        let mut exclude_patterns = file.exclude.unwrap_or_default();
        exclude_patterns.extend(args.exclude.iter().cloned());

        Self {
            start_dir: args
                .start_dir
                .clone()
                .or(file.start_dir)
                .unwrap_or(defaults.start_dir),
            scan_dir: args.scan.clone(),
            output: args.output.clone(),
            max_content_bytes: args
                .max_size
                .or(file.max_content_bytes)
                .unwrap_or(defaults.max_content_bytes),
            default_format: args
                .format
                .or(file.default_format)
                .unwrap_or(defaults.default_format),
            compression: args
                .compress
                .or(file.compression)
                .unwrap_or(defaults.compression),
            compression_level: args
                .compression_level
                .or(file.compression_level)
                .unwrap_or(defaults.compression_level),
            recursive: flag_pair(args.recursive, args.no_recursive)
                .or(file.recursive)
                .unwrap_or(defaults.recursive),
            show_hidden: flag_pair(args.hidden, args.no_hidden)
                .or(file.show_hidden)
                .unwrap_or(defaults.show_hidden),
            exclude_patterns,
            use_default_excludes: flag_pair(args.default_excludes, args.no_default_excludes)
                .or(file.use_default_excludes)
                .unwrap_or(defaults.use_default_excludes),
            force: flag_pair(args.force, args.no_force)
                .or(file.force)
                .unwrap_or(defaults.force),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_content_bytes > 0,
            Config,
            "max content size must be greater than 0"
        );
        ensure!(
            COMPRESSION_LEVELS.contains(&self.compression_level),
            Config,
            "compression level must be between 1 and 9, got {}",
            self.compression_level
        );

        match &self.scan_dir {
            Some(dir) => ensure!(
                dir.is_dir(),
                Config,
                "scan directory not found: {}",
                dir.display()
            ),
            None => ensure!(
                self.start_dir.is_dir(),
                Config,
                "start directory not found: {}",
                self.start_dir.display()
            ),
        }

        if let Some(output) = &self.output {
            if let Some(parent) = output.parent() {
                ensure!(
                    parent.as_os_str().is_empty() || parent.is_dir(),
                    Config,
                    "output directory not found: {}",
                    parent.display()
                );
            }
        }

        Ok(())
    }

    /// Effective configuration in the configuration file's syntax
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| DirScanError::Config(err.to_string()))
    }
}

/// Value of a `--flag`/`--no-flag` pair; `None` when neither was given
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
