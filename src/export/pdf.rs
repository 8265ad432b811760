//! Paginated PDF report in a monospaced built-in font
//!
//! Only the standard Type1 Courier fonts are used, so no font data is
//! embedded. Characters outside printable ASCII are drawn as `?`.

use std::fs::File;
use std::io::{BufWriter, Write};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::{line_count, ExportError, Exporter, ReportFormat};
use crate::types::ScanRun;
use crate::utils::format_file_size;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: f32 = 40.0;
const MARGIN_TOP: f32 = 50.0;
const FONT_SIZE: f32 = 9.0;
const LEADING: f32 = 11.0;
const FOOTER_Y: f32 = 28.0;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    text: String,
    bold: bool,
}

impl Line {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

/// Writes `.pdf` reports
#[derive(Debug, Clone, Copy)]
pub struct PdfExporter {
    lines_per_page: usize,
    wrap_width: usize,
}

impl Default for PdfExporter {
    fn default() -> Self {
        Self {
            lines_per_page: 67,
            wrap_width: 91,
        }
    }
}

impl Exporter for PdfExporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Pdf
    }

    fn write_report(&self, run: &ScanRun, out: &mut File) -> Result<(), ExportError> {
        let lines = self.layout(run);
        let pages = self.paginate(lines);
        let mut doc = build_document(run, &pages)?;

        let mut w = BufWriter::new(out);
        doc.save_to(&mut w)?;
        w.flush()?;
        Ok(())
    }
}

impl PdfExporter {
    /// Flatten the run into display lines
    fn layout(&self, run: &ScanRun) -> Vec<Line> {
        let mut lines = vec![
            Line::bold("DIRECTORY SCAN REPORT"),
            Line::plain(""),
            Line::plain(format!("Root:     {}", run.root().display())),
            Line::plain(format!(
                "Started:  {}",
                run.started_at().format("%Y-%m-%d %H:%M:%S")
            )),
            Line::plain(format!(
                "Files:    {} considered, {} text, {} binary, {} unreadable",
                run.total_files_considered(),
                run.total_files_included(),
                run.skipped_non_text(),
                run.total_errors()
            )),
            Line::plain(format!(
                "Content:  up to {} per file, {} truncated",
                format_file_size(run.max_content_bytes() as u64),
                run.truncated_count()
            )),
        ];
        if let Some(reason) = run.abort_reason() {
            lines.push(Line::bold(format!("INCOMPLETE: {}", reason)));
        }
        if run.records().is_empty() {
            lines.push(Line::plain(""));
            lines.push(Line::plain("No files were found in this directory."));
        }

        for (i, record) in run.records().iter().enumerate() {
            lines.push(Line::plain(""));
            for chunk in self.wrap(&format!("[{}] {}", i + 1, run.display_path(record))) {
                lines.push(Line::bold(chunk));
            }
            lines.push(Line::plain(format!(
                "{} | {} | {} lines{}",
                record.status(),
                format_file_size(record.size_bytes),
                line_count(record),
                if record.truncated { " | truncated" } else { "" }
            )));
            lines.push(Line::plain("-".repeat(self.wrap_width)));

            match &record.content {
                Some(content) => {
                    for source_line in content.lines() {
                        lines.extend(self.wrap(source_line).into_iter().map(Line::plain));
                    }
                }
                None => lines.push(Line::plain(record.content_or_placeholder())),
            }
        }

        lines
    }

    /// Split one source line into printable chunks of at most `wrap_width`
    fn wrap(&self, line: &str) -> Vec<String> {
        let cleaned: Vec<char> = line
            .replace('\t', "    ")
            .chars()
            .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
            .collect();

        if cleaned.is_empty() {
            return vec![String::new()];
        }
        cleaned
            .chunks(self.wrap_width.max(1))
            .map(|chunk| chunk.iter().collect())
            .collect()
    }

    /// Group lines into pages; there is always at least one page
    fn paginate(&self, lines: Vec<Line>) -> Vec<Vec<Line>> {
        let mut pages: Vec<Vec<Line>> = lines
            .chunks(self.lines_per_page.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();
        if pages.is_empty() {
            pages.push(Vec::new());
        }
        pages
    }
}

fn build_document(run: &ScanRun, pages: &[Vec<Line>]) -> Result<Document, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let total = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);
    for (index, page) in pages.iter().enumerate() {
        let content = page_content(page, index + 1, total);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => total as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let title = format!("Scan of {}", ascii_only(&run.root().display().to_string()));
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal(concat!("dirscan ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    Ok(doc)
}

fn page_content(lines: &[Line], page_number: usize, page_count: usize) -> Content {
    let top = PAGE_HEIGHT as f32 - MARGIN_TOP;
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN_LEFT.into(), top.into()]),
    ];

    let mut bold = None;
    for line in lines {
        if bold != Some(line.bold) {
            let font = if line.bold { "F2" } else { "F1" };
            operations.push(Operation::new("Tf", vec![font.into(), FONT_SIZE.into()]));
            bold = Some(line.bold);
        }
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.text.as_str())],
        ));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    // footer
    operations.extend([
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("Td", vec![MARGIN_LEFT.into(), FOOTER_Y.into()]),
        Operation::new(
            "Tj",
            vec![Object::string_literal(format!(
                "dirscan report - page {} of {}",
                page_number, page_count
            ))],
        ),
        Operation::new("ET", vec![]),
    ]);

    Content { operations }
}

fn ascii_only(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_replaces_non_ascii_and_splits() {
        let exporter = PdfExporter {
            lines_per_page: 10,
            wrap_width: 4,
        };
        assert_eq!(exporter.wrap("héllo!"), vec!["h?ll", "o!"]);
        assert_eq!(exporter.wrap(""), vec![""]);
        assert_eq!(exporter.wrap("\tx"), vec!["    ", "x"]);
    }

    #[test]
    fn test_paginate_never_returns_zero_pages() {
        let exporter = PdfExporter {
            lines_per_page: 2,
            wrap_width: 80,
        };
        assert_eq!(exporter.paginate(Vec::new()).len(), 1);
        let lines = (0..5).map(|i| Line::plain(i.to_string())).collect();
        assert_eq!(exporter.paginate(lines).len(), 3);
    }
}
