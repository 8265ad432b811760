/*!
 * Directory scanning
 *
 * Candidates are collected with a sorted `walkdir` pass first, which gives the
 * progress total and a deterministic traversal order; each candidate is then
 * classified one at a time.
 */

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use glob_match::glob_match;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::classifier::{ClassificationError, Classifier, DEFAULT_MAX_CONTENT_BYTES};
use crate::config::Config;
use crate::error::{DirScanError, Result};
use crate::progress::{CancelFlag, ProgressSink, ProgressState};
use crate::types::{AbortReason, ScanRecord, ScanRun, ScanRunBuilder};
use crate::utils::DEFAULT_EXCLUDE;

/// Options controlling one scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Walk sub-directories depth-first instead of direct children only
    pub recursive: bool,
    /// Content cap per text file
    pub max_content_bytes: usize,
    /// Consider entries whose name starts with a dot
    pub include_hidden: bool,
    /// Glob patterns matched against entry names; matches are not scanned
    pub exclude_patterns: Vec<String>,
    /// Exact paths never scanned (the report being written, for one)
    pub skip_paths: Vec<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            include_hidden: false,
            exclude_patterns: Vec::new(),
            skip_paths: Vec::new(),
        }
    }
}

impl ScanOptions {
    /// Options derived from the application configuration
    pub fn from_config(config: &Config) -> Self {
        let mut exclude_patterns = config.exclude_patterns.clone();
        if config.use_default_excludes {
            exclude_patterns.extend(DEFAULT_EXCLUDE.iter().map(|p| p.to_string()));
        }

        Self {
            recursive: config.recursive,
            max_content_bytes: config.max_content_bytes,
            include_hidden: config.show_hidden,
            exclude_patterns,
            skip_paths: Vec::new(),
        }
    }
}

/// Scanner for directory contents
#[derive(Debug, Clone)]
pub struct Scanner {
    options: ScanOptions,
    classifier: Classifier,
}

impl Scanner {
    /// Create a new scanner
    pub fn new(options: ScanOptions) -> Self {
        let classifier = Classifier::new(options.max_content_bytes);
        Self {
            options,
            classifier,
        }
    }

    /// Scan `root`, reporting progress after every file.
    ///
    /// Per-file failures become records. The only error returned is a root
    /// that cannot be listed at all; a root that disappears mid-run or a raised
    /// cancel flag yields an incomplete run instead.
    pub fn scan(
        &self,
        root: &Path,
        progress: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<ScanRun> {
        let root = fs::canonicalize(root).map_err(|source| DirScanError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;
        fs::read_dir(&root).map_err(|source| DirScanError::RootUnreadable {
            path: root.clone(),
            source,
        })?;

        let mut run = ScanRunBuilder::new(
            root.clone(),
            self.options.max_content_bytes,
            self.options.recursive,
        );
        let candidates = self.collect_candidates(&root, &mut run);

        let mut state = ProgressState::new(candidates.len());
        info!(
            "Scanning {} candidate files in {}",
            state.total,
            root.display()
        );
        progress.report(state.current, state.total);

        for path in candidates {
            if cancel.is_cancelled() {
                info!("Scan cancelled after {} files", state.current);
                return Ok(run.abort(AbortReason::Cancelled));
            }

            let record = self.scan_file(&path);
            let vanished = record.error == Some(ClassificationError::NotFound);
            run.push(record);

            state.advance();
            progress.report(state.current, state.total);

            if vanished && !root.is_dir() {
                warn!("Scan root {} disappeared during the scan", root.display());
                return Ok(run.abort(AbortReason::RootRemoved));
            }
        }

        Ok(run.finish())
    }

    /// Classify one file and wrap the result in a record
    fn scan_file(&self, path: &Path) -> ScanRecord {
        let classification = self.classifier.classify(path);
        if let Some(err) = &classification.error {
            debug!("Could not read {}: {}", path.display(), err);
        } else {
            debug!(
                "Classified {} as {}",
                path.display(),
                if classification.is_text { "text" } else { "binary" }
            );
        }

        let name = path.file_name().unwrap_or_default().to_string_lossy();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());

        ScanRecord {
            path: path.to_path_buf(),
            size_bytes: classification.size_bytes,
            modified: classification.modified.map(DateTime::<Local>::from),
            extension,
            hidden: name.starts_with('.'),
            is_text: classification.is_text,
            skipped: !classification.is_text && classification.error.is_none(),
            content: classification.content,
            truncated: classification.truncated,
            error: classification.error,
        }
    }

    /// Walk `root` and collect every non-directory entry to classify
    fn collect_candidates(&self, root: &Path, run: &mut ScanRunBuilder) -> Vec<PathBuf> {
        let max_depth = if self.options.recursive { usize::MAX } else { 1 };
        let mut visited: HashSet<PathBuf> = HashSet::new();
        visited.insert(root.to_path_buf());

        let mut candidates = Vec::new();
        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    warn!("Cannot read directory {}: {}", path.display(), err);
                    run.note_unreadable_directory(path);
                    continue;
                }
            };

            if self.should_ignore(&entry) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            if entry.file_type().is_dir() {
                // never re-enter a directory within one run
                if !visited.insert(entry.path().to_path_buf()) {
                    walker.skip_current_dir();
                }
                continue;
            }

            if entry.path_is_symlink() && entry.path().is_dir() {
                debug!("Not following directory link {}", entry.path().display());
                continue;
            }

            candidates.push(entry.into_path());
        }

        candidates
    }

    /// Check if an entry should be left out based on visibility and patterns
    pub fn should_ignore(&self, entry: &DirEntry) -> bool {
        let file_name = entry.file_name().to_string_lossy();

        if !self.options.include_hidden && file_name.starts_with('.') {
            return true;
        }

        if self
            .options
            .exclude_patterns
            .iter()
            .any(|pattern| glob_match(pattern, &file_name))
        {
            return true;
        }

        // Don't scan the report being written
        self.options.skip_paths.iter().any(|p| p == entry.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::io;
    use tempfile::tempdir;

    fn scan(root: &Path, options: ScanOptions) -> Result<ScanRun> {
        Scanner::new(options).scan(root, &mut NoProgress, &CancelFlag::new())
    }

    #[test]
    fn test_non_recursive_by_default() -> io::Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("sub"))?;
        fs::write(dir.path().join("sub").join("inner.txt"), "inner")?;
        fs::write(dir.path().join("top.txt"), "top")?;

        let run = scan(dir.path(), ScanOptions::default()).unwrap();
        assert_eq!(run.total_files_considered(), 1);
        assert_eq!(run.records()[0].file_name(), "top.txt");
        Ok(())
    }

    #[test]
    fn test_recursive_depth_first_in_name_order() -> io::Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("b_dir").join("deep"))?;
        fs::write(dir.path().join("a.txt"), "a")?;
        fs::write(dir.path().join("b_dir").join("deep").join("d.txt"), "d")?;
        fs::write(dir.path().join("b_dir").join("c.txt"), "c")?;
        fs::write(dir.path().join("z.txt"), "z")?;

        let options = ScanOptions {
            recursive: true,
            ..ScanOptions::default()
        };
        let run = scan(dir.path(), options).unwrap();
        let paths: Vec<String> = run.records().iter().map(|r| run.display_path(r)).collect();
        let expected: Vec<String> = ["a.txt", "b_dir/c.txt", "b_dir/deep/d.txt", "z.txt"]
            .iter()
            .map(|p| PathBuf::from(p).to_string_lossy().to_string())
            .collect();
        assert_eq!(paths, expected);
        Ok(())
    }

    #[test]
    fn test_hidden_and_excluded_entries_are_skipped() -> io::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join(".env"), "SECRET=1")?;
        fs::write(dir.path().join("notes.log"), "log")?;
        fs::write(dir.path().join("keep.md"), "# keep")?;

        let options = ScanOptions {
            exclude_patterns: vec!["*.log".to_string()],
            ..ScanOptions::default()
        };
        let run = scan(dir.path(), options).unwrap();
        assert_eq!(run.total_files_considered(), 1);
        assert_eq!(run.records()[0].file_name(), "keep.md");

        let options = ScanOptions {
            include_hidden: true,
            ..ScanOptions::default()
        };
        let run = scan(dir.path(), options).unwrap();
        assert_eq!(run.total_files_considered(), 3);
        assert!(run.records()[0].hidden);
        Ok(())
    }

    #[test]
    fn test_skip_paths() -> io::Result<()> {
        let dir = tempdir()?;
        let root = fs::canonicalize(dir.path())?;
        fs::write(root.join("report.json"), "{}")?;
        fs::write(root.join("data.txt"), "data")?;

        let options = ScanOptions {
            skip_paths: vec![root.join("report.json")],
            ..ScanOptions::default()
        };
        let run = scan(&root, options).unwrap();
        assert_eq!(run.total_files_considered(), 1);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_not_followed() -> io::Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("real"))?;
        fs::write(dir.path().join("real").join("f.txt"), "f")?;
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link"))?;
        // a link back to the root would loop forever if followed
        std::os::unix::fs::symlink(dir.path(), dir.path().join("real").join("loop"))?;

        let options = ScanOptions {
            recursive: true,
            ..ScanOptions::default()
        };
        let run = scan(dir.path(), options).unwrap();
        assert_eq!(run.total_files_considered(), 1);
        assert_eq!(run.records()[0].file_name(), "f.txt");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_becomes_error_record() -> io::Result<()> {
        let dir = tempdir()?;
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling"))?;

        let run = scan(dir.path(), ScanOptions::default()).unwrap();
        assert_eq!(run.total_files_considered(), 1);
        assert_eq!(run.total_errors(), 1);
        assert_eq!(run.records()[0].error, Some(ClassificationError::NotFound));
        Ok(())
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let result = scan(Path::new("/no/such/dir/for/dirscan"), ScanOptions::default());
        assert!(matches!(result, Err(DirScanError::RootUnreadable { .. })));
    }

    #[test]
    fn test_cancel_before_first_file_yields_incomplete_run() -> io::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.txt"), "a")?;

        let cancel = CancelFlag::new();
        cancel.cancel();
        let run = Scanner::new(ScanOptions::default())
            .scan(dir.path(), &mut NoProgress, &cancel)
            .unwrap();
        assert!(run.is_incomplete());
        assert_eq!(run.abort_reason(), Some(AbortReason::Cancelled));
        assert_eq!(run.total_files_considered(), 0);
        Ok(())
    }

    #[test]
    fn test_cancel_is_observed_between_files() -> io::Result<()> {
        let dir = tempdir()?;
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(dir.path().join(name), name)?;
        }

        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let mut sink = move |current: usize, _total: usize| {
            if current == 1 {
                trigger.cancel();
            }
        };
        let run = Scanner::new(ScanOptions::default())
            .scan(dir.path(), &mut sink, &cancel)
            .unwrap();
        assert!(run.is_incomplete());
        assert_eq!(run.total_files_considered(), 1);
        assert_eq!(run.records()[0].file_name(), "a.txt");
        Ok(())
    }

    #[test]
    fn test_root_removed_mid_scan_yields_incomplete_run() -> io::Result<()> {
        let parent = tempdir()?;
        let root = parent.path().join("root");
        fs::create_dir(&root)?;
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(root.join(name), name)?;
        }

        let doomed = root.clone();
        let mut sink = move |current: usize, _total: usize| {
            if current == 1 {
                fs::remove_dir_all(&doomed).unwrap();
            }
        };
        let run = Scanner::new(ScanOptions::default())
            .scan(&root, &mut sink, &CancelFlag::new())
            .unwrap();

        assert!(run.is_incomplete());
        assert_eq!(run.abort_reason(), Some(AbortReason::RootRemoved));
        assert_eq!(run.total_files_considered(), 2);
        assert_eq!(run.records()[1].error, Some(ClassificationError::NotFound));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_is_recorded_without_blocking() -> io::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.txt"), "a")?;
        let status = std::process::Command::new("mkfifo")
            .arg(dir.path().join("pipe"))
            .status()?;
        assert!(status.success());

        let run = scan(dir.path(), ScanOptions::default()).unwrap();
        assert_eq!(run.total_files_considered(), 2);
        assert_eq!(run.total_errors(), 1);
        let pipe = &run.records()[1];
        assert_eq!(pipe.file_name(), "pipe");
        assert_eq!(pipe.error, Some(ClassificationError::SpecialFile));
        assert!(!run.is_incomplete());
        Ok(())
    }

    #[test]
    fn test_progress_is_reported_per_file() -> io::Result<()> {
        let dir = tempdir()?;
        for name in ["a.txt", "b.bin", "c.txt"] {
            fs::write(dir.path().join(name), name)?;
        }

        let mut seen = Vec::new();
        let mut sink = |current: usize, total: usize| seen.push((current, total));
        Scanner::new(ScanOptions::default())
            .scan(dir.path(), &mut sink, &CancelFlag::new())
            .unwrap();
        assert_eq!(seen, vec![(0, 3), (1, 3), (2, 3), (3, 3)]);
        Ok(())
    }
}
