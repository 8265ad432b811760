//! Plain-text report: a header box, an optional table of contents and one
//! numbered section per file.

use std::fs::File;
use std::io::{BufWriter, Write};

use super::{char_count, line_count, ExportError, Exporter, ReportFormat};
use crate::types::{ScanRecord, ScanRun};
use crate::utils::format_file_size;

/// Files above which a table of contents is written
const TOC_THRESHOLD: usize = 5;

const RULE_WIDTH: usize = 78;

/// Writes `.txt` reports
#[derive(Debug, Default, Clone, Copy)]
pub struct TxtExporter;

impl Exporter for TxtExporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Txt
    }

    fn write_report(&self, run: &ScanRun, out: &mut File) -> Result<(), ExportError> {
        let mut w = BufWriter::new(out);

        write_header(&mut w, run)?;

        if run.records().len() > TOC_THRESHOLD {
            writeln!(w, "CONTENTS")?;
            for (i, record) in run.records().iter().enumerate() {
                writeln!(w, "  {:>4}. {}", i + 1, run.display_path(record))?;
            }
            writeln!(w)?;
        }

        for (i, record) in run.records().iter().enumerate() {
            write_section(&mut w, run, i + 1, record)?;
        }

        if run.records().is_empty() {
            writeln!(w, "No files were found in this directory.")?;
        }

        w.flush()?;
        Ok(())
    }
}

fn write_header<W: Write>(w: &mut W, run: &ScanRun) -> Result<(), ExportError> {
    let inner = RULE_WIDTH - 2;
    let lines = [
        "DIRECTORY SCAN REPORT".to_string(),
        format!("Root:      {}", run.root().display()),
        format!("Started:   {}", run.started_at().format("%Y-%m-%d %H:%M:%S")),
        format!("Finished:  {}", run.finished_at().format("%Y-%m-%d %H:%M:%S")),
        format!(
            "Files:     {} considered, {} text, {} binary, {} unreadable",
            run.total_files_considered(),
            run.total_files_included(),
            run.skipped_non_text(),
            run.total_errors()
        ),
        format!(
            "Content:   up to {} per file, {} truncated",
            format_file_size(run.max_content_bytes() as u64),
            run.truncated_count()
        ),
    ];

    writeln!(w, "+{}+", "-".repeat(inner))?;
    for line in &lines {
        writeln!(w, "| {:<width$} |", line, width = inner - 2)?;
    }
    if let Some(reason) = run.abort_reason() {
        writeln!(w, "| {:<width$} |", format!("INCOMPLETE: {}", reason), width = inner - 2)?;
    }
    writeln!(w, "+{}+", "-".repeat(inner))?;
    writeln!(w)?;

    for dir in run.unreadable_directories() {
        writeln!(w, "Warning: could not read directory {}", dir.display())?;
    }
    if !run.unreadable_directories().is_empty() {
        writeln!(w)?;
    }

    Ok(())
}

fn write_section<W: Write>(
    w: &mut W,
    run: &ScanRun,
    number: usize,
    record: &ScanRecord,
) -> Result<(), ExportError> {
    writeln!(w, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(w, "[{}] {}", number, run.display_path(record))?;
    write!(
        w,
        "    {} | {}",
        record.status(),
        format_file_size(record.size_bytes)
    )?;
    if let Some(modified) = record.modified {
        write!(w, " | modified {}", modified.format("%Y-%m-%d %H:%M"))?;
    }
    if record.content.is_some() {
        write!(
            w,
            " | {} lines, {} chars",
            line_count(record),
            char_count(record)
        )?;
    }
    writeln!(w)?;
    writeln!(w, "{}", "-".repeat(RULE_WIDTH))?;

    match &record.content {
        Some(content) => {
            let lines: Vec<&str> = content.lines().collect();
            let width = lines.len().to_string().len();
            for (i, line) in lines.iter().enumerate() {
                writeln!(w, "{:>width$} | {}", i + 1, line, width = width)?;
            }
            if record.truncated {
                writeln!(
                    w,
                    "... [truncated at {} of {}]",
                    format_file_size(run.max_content_bytes() as u64),
                    format_file_size(record.size_bytes)
                )?;
            }
        }
        None => writeln!(w, "{}", record.content_or_placeholder())?,
    }

    writeln!(w)?;
    Ok(())
}
