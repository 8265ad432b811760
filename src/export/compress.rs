//! Compressed reports
//!
//! `CompressedExporter` wraps any other exporter. The plain report is written
//! to an anonymous temporary file first and then streamed through the encoder
//! into the destination, so formats that need to seek (pdf, epub) work too.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use bzip2::write::BzEncoder;
use clap::ValueEnum;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;
use xz2::write::XzEncoder;

use super::{has_extension, ExportError, Exporter, ReportFormat};
use crate::types::ScanRun;

/// Level used when none is configured
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Levels accepted by every encoder
pub const COMPRESSION_LEVELS: RangeInclusive<u32> = 1..=9;

/// Compression applied on top of a report format
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, ValueEnum, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Plain report
    #[default]
    None,
    /// gzip (`.gz`)
    Gzip,
    /// bzip2 (`.bz2`)
    Bz2,
    /// xz/LZMA2 (`.xz`)
    #[value(alias = "lzma")]
    #[serde(alias = "lzma")]
    Xz,
}

impl Compression {
    /// Every option, in menu order
    pub const ALL: [Compression; 4] = [
        Compression::None,
        Compression::Gzip,
        Compression::Bz2,
        Compression::Xz,
    ];

    /// Extension appended after the format's own, without the dot
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gz"),
            Compression::Bz2 => Some("bz2"),
            Compression::Xz => Some("xz"),
        }
    }

    /// Next option in menu order, wrapping around
    pub fn next(&self) -> Self {
        let index = Self::ALL.iter().position(|c| c == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    /// `path` with the format extension and then this compression's
    /// extension, each appended only when missing.
    ///
    /// `out`, `out.json` and `out.json.gz` all become `out.json.gz` for
    /// gzip-compressed JSON.
    pub fn destination(&self, format: ReportFormat, path: &Path) -> PathBuf {
        let ext = match self.extension() {
            Some(ext) => ext,
            None => return format.with_extension(path),
        };

        let base = if has_extension(path, ext) {
            path.with_extension("")
        } else {
            path.to_path_buf()
        };
        let mut name = format.with_extension(&base).into_os_string();
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    }

    /// Wrap `exporter` so its output is compressed; `None` returns it as is
    pub fn wrap(self, exporter: Box<dyn Exporter>, level: u32) -> Box<dyn Exporter> {
        match self {
            Compression::None => exporter,
            _ => Box::new(CompressedExporter::new(exporter, self, level)),
        }
    }

    /// Stream `input` through this encoder into `out`
    fn encode<R: Read, W: Write>(&self, input: &mut R, mut out: W, level: u32) -> io::Result<()> {
        match self {
            Compression::None => {
                io::copy(input, &mut out)?;
            }
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(out, flate2::Compression::new(level));
                io::copy(input, &mut encoder)?;
                encoder.finish()?;
            }
            Compression::Bz2 => {
                let mut encoder = BzEncoder::new(out, bzip2::Compression::new(level));
                io::copy(input, &mut encoder)?;
                encoder.finish()?;
            }
            Compression::Xz => {
                let mut encoder = XzEncoder::new(out, level);
                io::copy(input, &mut encoder)?;
                encoder.finish()?;
            }
        }
        Ok(())
    }
}

/// Exporter writing another exporter's report through a compressor
pub struct CompressedExporter {
    inner: Box<dyn Exporter>,
    compression: Compression,
    level: u32,
}

impl CompressedExporter {
    /// Compress `inner`'s output; `level` is clamped to 1..=9
    pub fn new(inner: Box<dyn Exporter>, compression: Compression, level: u32) -> Self {
        Self {
            inner,
            compression,
            level: level.clamp(*COMPRESSION_LEVELS.start(), *COMPRESSION_LEVELS.end()),
        }
    }
}

impl Exporter for CompressedExporter {
    fn format(&self) -> ReportFormat {
        self.inner.format()
    }

    fn compression(&self) -> Compression {
        self.compression
    }

    fn validate(&self, destination: &Path) -> Result<(), ExportError> {
        if let Some(ext) = self.compression.extension() {
            if !has_extension(destination, ext) {
                return Err(ExportError::WrongExtension {
                    path: destination.to_path_buf(),
                    expected: ext,
                });
            }
            return self.inner.validate(&destination.with_extension(""));
        }
        self.inner.validate(destination)
    }

    fn write_report(&self, run: &ScanRun, out: &mut File) -> Result<(), ExportError> {
        let mut plain = tempfile::tempfile()?;
        self.inner.write_report(run, &mut plain)?;

        let plain_size = plain.seek(SeekFrom::End(0))?;
        plain.seek(SeekFrom::Start(0))?;
        debug!(
            "Compressing {} bytes of {} with {} level {}",
            plain_size,
            self.inner.format(),
            self.compression,
            self.level
        );

        self.compression.encode(&mut plain, out, self.level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_appends_both_extensions_once() {
        let gz = Compression::Gzip;
        let json = ReportFormat::Json;
        assert_eq!(
            gz.destination(json, Path::new("out")),
            PathBuf::from("out.json.gz")
        );
        assert_eq!(
            gz.destination(json, Path::new("out.json")),
            PathBuf::from("out.json.gz")
        );
        assert_eq!(
            gz.destination(json, Path::new("out.json.gz")),
            PathBuf::from("out.json.gz")
        );
        assert_eq!(
            Compression::None.destination(json, Path::new("out")),
            PathBuf::from("out.json")
        );
        assert_eq!(
            Compression::Xz.destination(ReportFormat::Pdf, Path::new("r.xz")),
            PathBuf::from("r.pdf.xz")
        );
    }

    #[test]
    fn test_lzma_is_an_alias_for_xz() {
        assert_eq!(Compression::from_str("lzma", true), Ok(Compression::Xz));
        assert_eq!(Compression::from_str("BZ2", true), Ok(Compression::Bz2));
        let parsed: Compression = serde_json::from_str("\"lzma\"").unwrap();
        assert_eq!(parsed, Compression::Xz);
        assert_eq!(Compression::Bz2.to_string(), "bz2");
    }

    #[test]
    fn test_validate_requires_both_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Compression::Gzip.wrap(ReportFormat::Csv.exporter(), 6);

        assert!(exporter.validate(&dir.path().join("r.csv.gz")).is_ok());
        assert!(matches!(
            exporter.validate(&dir.path().join("r.csv")),
            Err(ExportError::WrongExtension { expected: "gz", .. })
        ));
        assert!(matches!(
            exporter.validate(&dir.path().join("r.txt.gz")),
            Err(ExportError::WrongExtension { expected: "csv", .. })
        ));
    }

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(Compression::None.next(), Compression::Gzip);
        assert_eq!(Compression::Xz.next(), Compression::None);
    }
}
