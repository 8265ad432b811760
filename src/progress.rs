/*!
 * Progress reporting and cooperative cancellation for scans
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;

/// Receives "current of total files processed" updates from the scanner.
///
/// Sinks cannot fail the scan: anything that goes wrong while presenting
/// progress must be handled inside the sink.
pub trait ProgressSink {
    /// Called after each file with the running count and the candidate total
    fn report(&mut self, current: usize, total: usize);
}

// Implement ProgressSink for closures
impl<F> ProgressSink for F
where
    F: FnMut(usize, usize),
{
    fn report(&mut self, current: usize, total: usize) {
        self(current, total)
    }
}

impl ProgressSink for ProgressBar {
    fn report(&mut self, current: usize, total: usize) {
        self.set_length(total as u64);
        self.set_position(current as u64);
    }
}

/// Sink that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _current: usize, _total: usize) {}
}

/// Counter for one scan; `current` never goes backwards within a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    /// Files processed so far
    pub current: usize,
    /// Candidate files, 0 while unknown
    pub total: usize,
}

impl ProgressState {
    /// Fresh counter for a new scan
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    /// Count one more processed file
    pub fn advance(&mut self) -> Self {
        self.current += 1;
        if self.current > self.total {
            self.total = self.current;
        }
        *self
    }

    /// Progress percentage, 0 when the total is unknown
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }

        ((self.current * 100) / self.total).min(100) as u8
    }

    /// Ratio in `0.0..=1.0`, suited to gauges
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64 / self.total as f64).clamp(0.0, 1.0)
        }
    }
}

/// Shared flag a caller raises to stop a scan between two files
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// New, lowered flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Lower the flag before a new run
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
