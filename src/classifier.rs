/*!
 * Text/binary classification with bounded reads
 *
 * Detection is a best-effort heuristic over the leading bytes of a file: a
 * NUL byte, or more than `NON_PRINTABLE_RATIO` of control characters, marks
 * the file as binary. It does not try to recognise encodings or formats.
 */

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes inspected to decide between text and binary
pub const SAMPLE_BYTES: usize = 8192;

/// Share of control bytes in the sample above which a file counts as binary.
///
/// Tunable; there is no "correct" value for this heuristic.
pub const NON_PRINTABLE_RATIO: f32 = 0.10;

/// Default cap on the content kept for one text file
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 8192;

/// Why a file could not be classified. Stored in the scan record, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ClassificationError {
    /// Open or read was refused
    #[error("permission denied")]
    PermissionDenied,
    /// File vanished between listing and reading, or a dangling link
    #[error("file not found")]
    NotFound,
    /// FIFO, socket, device or anything else that is not a regular file
    #[error("not a regular file")]
    SpecialFile,
    /// Any other I/O failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<io::Error> for ClassificationError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => ClassificationError::PermissionDenied,
            io::ErrorKind::NotFound => ClassificationError::NotFound,
            _ => ClassificationError::Io(err.to_string()),
        }
    }
}

/// Result of classifying one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Classified as text
    pub is_text: bool,
    /// Size from metadata (0 when metadata was unavailable)
    pub size_bytes: u64,
    /// Modification time from metadata
    pub modified: Option<SystemTime>,
    /// Decoded leading content, text files only
    pub content: Option<String>,
    /// File is larger than the cap
    pub truncated: bool,
    /// Set when the file could not be read
    pub error: Option<ClassificationError>,
}

impl Classification {
    fn failed(size_bytes: u64, modified: Option<SystemTime>, error: ClassificationError) -> Self {
        Self {
            is_text: false,
            size_bytes,
            modified,
            content: None,
            truncated: false,
            error: Some(error),
        }
    }
}

/// Decides text vs binary and reads capped content
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    max_content_bytes: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTENT_BYTES)
    }
}

impl Classifier {
    /// Create a classifier keeping at most `max_content_bytes` of each text file
    pub fn new(max_content_bytes: usize) -> Self {
        Self { max_content_bytes }
    }

    /// Content cap in bytes
    pub fn max_content_bytes(&self) -> usize {
        self.max_content_bytes
    }

    /// Classify a file. Failures are reported in the result, never returned.
    pub fn classify(&self, path: &Path) -> Classification {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => return Classification::failed(0, None, err.into()),
        };
        let size_bytes = metadata.len();
        let modified = metadata.modified().ok();

        // Opening a FIFO would block, so special files are rejected up front
        if !metadata.is_file() {
            return Classification::failed(size_bytes, modified, ClassificationError::SpecialFile);
        }

        let buffer = match self.read_leading_bytes(path) {
            Ok(buffer) => buffer,
            Err(err) => return Classification::failed(size_bytes, modified, err.into()),
        };

        let sample = &buffer[..buffer.len().min(SAMPLE_BYTES)];
        if looks_binary(sample) {
            return Classification {
                is_text: false,
                size_bytes,
                modified,
                content: None,
                truncated: false,
                error: None,
            };
        }

        let over_cap = buffer.len() > self.max_content_bytes;
        let kept = &buffer[..buffer.len().min(self.max_content_bytes)];
        let (content, clamped) = decode_prefix(kept, over_cap, self.max_content_bytes);

        Classification {
            is_text: true,
            size_bytes,
            modified,
            content: Some(content),
            truncated: over_cap || clamped,
            error: None,
        }
    }

    /// Read enough to both classify and fill the content cap, plus one byte
    /// to detect truncation. Nothing past that limit is read.
    fn read_leading_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        let limit = SAMPLE_BYTES.max(self.max_content_bytes.saturating_add(1));
        let file = File::open(path)?;
        let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
        file.take(limit as u64).read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

/// Heuristic binary check over a sample of leading bytes
pub fn looks_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }

    // Control characters other than \t \n \v \f \r and ESC
    let non_printable = sample
        .iter()
        .filter(|&&b| b < 9 || (b > 13 && b < 32 && b != 27) || b == 127)
        .count();

    non_printable as f32 / sample.len() as f32 > NON_PRINTABLE_RATIO
}

/// Decode content bytes as UTF-8, returning the text and whether it had to
/// be shortened to fit `cap`.
///
/// A multi-byte character cut in half by the cap is dropped rather than
/// replaced, so valid UTF-8 stays a true prefix of the file. Other invalid
/// sequences (Latin-1 text, for one) become U+FFFD, which takes three bytes;
/// the decoded text is then cut back to `cap` bytes on a character boundary.
fn decode_prefix(bytes: &[u8], over_cap: bool, cap: usize) -> (String, bool) {
    let mut text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) if over_cap && err.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..err.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    };

    if text.len() <= cap {
        return (text, false);
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    (text, true)
}
