//! EPUB 3 report: a summary chapter followed by one chapter per file

use std::fs::File;
use std::io::{self, Write};

use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{line_count, ExportError, Exporter, ReportFormat};
use crate::types::{ScanRecord, ScanRun};
use crate::utils::format_file_size;

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const STYLESHEET: &str = "body { font-family: sans-serif; }\n\
pre { font-family: monospace; font-size: 0.8em; white-space: pre-wrap; }\n\
.meta { color: #555555; }\n\
.placeholder { font-style: italic; }\n";

/// Writes `.epub` reports
#[derive(Debug, Default, Clone, Copy)]
pub struct EpubExporter;

/// One XHTML document in the book
struct Chapter {
    id: String,
    href: String,
    title: String,
    body: Vec<u8>,
}

impl Exporter for EpubExporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Epub
    }

    fn write_report(&self, run: &ScanRun, out: &mut File) -> Result<(), ExportError> {
        let title = format!("Scan of {}", run.root().display());

        let mut chapters = vec![Chapter {
            id: "summary".to_string(),
            href: "summary.xhtml".to_string(),
            title: "Summary".to_string(),
            body: summary_chapter(run)?,
        }];
        for (i, record) in run.records().iter().enumerate() {
            let path = run.display_path(record);
            chapters.push(Chapter {
                id: format!("file_{:04}", i + 1),
                href: format!("file_{:04}.xhtml", i + 1),
                body: file_chapter(run, record, &path)?,
                title: path,
            });
        }

        let mut zip = ZipWriter::new(out);
        // the mimetype entry must come first and stay uncompressed
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER_XML.as_bytes())?;

        zip.start_file("OEBPS/content.opf", deflated)?;
        zip.write_all(&package_document(run, &title, &chapters)?)?;

        zip.start_file("OEBPS/nav.xhtml", deflated)?;
        zip.write_all(&navigation_document(&title, &chapters)?)?;

        zip.start_file("OEBPS/style.css", deflated)?;
        zip.write_all(STYLESHEET.as_bytes())?;

        for chapter in &chapters {
            zip.start_file(format!("OEBPS/{}", chapter.href), deflated)?;
            zip.write_all(&chapter.body)?;
        }

        zip.finish()?;
        Ok(())
    }
}

/// Drop characters XML 1.0 cannot represent
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
        })
        .collect()
}

fn new_writer() -> io::Result<Writer<Vec<u8>>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(writer)
}

fn text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    class: Option<&str>,
    text: &str,
) -> io::Result<()> {
    let mut start = BytesStart::new(name);
    if let Some(class) = class {
        start.push_attribute(("class", class));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(&xml_safe(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Write an XHTML document around `body`
fn xhtml_document<F>(title: &str, body: F) -> io::Result<Vec<u8>>
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> io::Result<()>,
{
    let mut writer = new_writer()?;

    let mut html = BytesStart::new("html");
    html.push_attribute(("xmlns", "http://www.w3.org/1999/xhtml"));
    html.push_attribute(("xmlns:epub", "http://www.idpf.org/2007/ops"));
    writer.write_event(Event::Start(html))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    text_element(&mut writer, "title", None, title)?;
    let mut link = BytesStart::new("link");
    link.push_attribute(("rel", "stylesheet"));
    link.push_attribute(("type", "text/css"));
    link.push_attribute(("href", "style.css"));
    writer.write_event(Event::Empty(link))?;
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    body(&mut writer)?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;

    writer.write_event(Event::End(BytesEnd::new("html")))?;
    Ok(writer.into_inner())
}

fn summary_chapter(run: &ScanRun) -> io::Result<Vec<u8>> {
    xhtml_document("Summary", |w| {
        text_element(w, "h1", None, "Directory scan report")?;
        let facts = [
            format!("Root: {}", run.root().display()),
            format!("Started: {}", run.started_at().format("%Y-%m-%d %H:%M:%S")),
            format!("Finished: {}", run.finished_at().format("%Y-%m-%d %H:%M:%S")),
            format!("Files considered: {}", run.total_files_considered()),
            format!("Text files included: {}", run.total_files_included()),
            format!("Binary files skipped: {}", run.skipped_non_text()),
            format!("Unreadable files: {}", run.total_errors()),
            format!("Truncated files: {}", run.truncated_count()),
            format!(
                "Content cap: {}",
                format_file_size(run.max_content_bytes() as u64)
            ),
        ];
        w.write_event(Event::Start(BytesStart::new("ul")))?;
        for fact in &facts {
            text_element(w, "li", None, fact)?;
        }
        w.write_event(Event::End(BytesEnd::new("ul")))?;

        if let Some(reason) = run.abort_reason() {
            text_element(w, "p", Some("meta"), &format!("Incomplete: {}", reason))?;
        }
        if run.records().is_empty() {
            text_element(w, "p", Some("placeholder"), "No files were found in this directory.")?;
        }
        Ok(())
    })
}

fn file_chapter(run: &ScanRun, record: &ScanRecord, path: &str) -> io::Result<Vec<u8>> {
    xhtml_document(path, |w| {
        text_element(w, "h2", None, path)?;

        let mut meta = format!(
            "{} | {} | {} lines",
            record.status(),
            format_file_size(record.size_bytes),
            line_count(record)
        );
        if record.truncated {
            meta.push_str(&format!(
                " | truncated to {}",
                format_file_size(run.max_content_bytes() as u64)
            ));
        }
        text_element(w, "p", Some("meta"), &meta)?;

        match &record.content {
            Some(content) => text_element(w, "pre", None, content)?,
            None => text_element(w, "p", Some("placeholder"), &record.content_or_placeholder())?,
        }
        Ok(())
    })
}

fn package_document(run: &ScanRun, title: &str, chapters: &[Chapter]) -> io::Result<Vec<u8>> {
    let mut w = new_writer()?;

    let mut package = BytesStart::new("package");
    package.push_attribute(("xmlns", "http://www.idpf.org/2007/opf"));
    package.push_attribute(("version", "3.0"));
    package.push_attribute(("unique-identifier", "bookid"));
    w.write_event(Event::Start(package))?;

    let mut metadata = BytesStart::new("metadata");
    metadata.push_attribute(("xmlns:dc", "http://purl.org/dc/elements/1.1/"));
    w.write_event(Event::Start(metadata))?;

    let mut identifier = BytesStart::new("dc:identifier");
    identifier.push_attribute(("id", "bookid"));
    w.write_event(Event::Start(identifier))?;
    let id = format!(
        "urn:dirscan:{}",
        run.started_at().with_timezone(&Utc).format("%Y%m%dT%H%M%S%.3fZ")
    );
    w.write_event(Event::Text(BytesText::new(&id)))?;
    w.write_event(Event::End(BytesEnd::new("dc:identifier")))?;

    text_element(&mut w, "dc:title", None, title)?;
    text_element(&mut w, "dc:language", None, "en")?;
    text_element(&mut w, "dc:creator", None, env!("CARGO_PKG_NAME"))?;

    let mut modified = BytesStart::new("meta");
    modified.push_attribute(("property", "dcterms:modified"));
    w.write_event(Event::Start(modified))?;
    let stamp = run
        .finished_at()
        .with_timezone(&Utc)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    w.write_event(Event::Text(BytesText::new(&stamp)))?;
    w.write_event(Event::End(BytesEnd::new("meta")))?;

    w.write_event(Event::End(BytesEnd::new("metadata")))?;

    w.write_event(Event::Start(BytesStart::new("manifest")))?;
    manifest_item(&mut w, "nav", "nav.xhtml", "application/xhtml+xml", Some("nav"))?;
    manifest_item(&mut w, "css", "style.css", "text/css", None)?;
    for chapter in chapters {
        manifest_item(&mut w, &chapter.id, &chapter.href, "application/xhtml+xml", None)?;
    }
    w.write_event(Event::End(BytesEnd::new("manifest")))?;

    w.write_event(Event::Start(BytesStart::new("spine")))?;
    for chapter in chapters {
        let mut itemref = BytesStart::new("itemref");
        itemref.push_attribute(("idref", chapter.id.as_str()));
        w.write_event(Event::Empty(itemref))?;
    }
    w.write_event(Event::End(BytesEnd::new("spine")))?;

    w.write_event(Event::End(BytesEnd::new("package")))?;
    Ok(w.into_inner())
}

fn manifest_item<W: Write>(
    w: &mut Writer<W>,
    id: &str,
    href: &str,
    media_type: &str,
    properties: Option<&str>,
) -> io::Result<()> {
    let mut item = BytesStart::new("item");
    item.push_attribute(("id", id));
    item.push_attribute(("href", href));
    item.push_attribute(("media-type", media_type));
    if let Some(properties) = properties {
        item.push_attribute(("properties", properties));
    }
    w.write_event(Event::Empty(item))?;
    Ok(())
}

fn navigation_document(title: &str, chapters: &[Chapter]) -> io::Result<Vec<u8>> {
    xhtml_document(title, |w| {
        let mut nav = BytesStart::new("nav");
        nav.push_attribute(("epub:type", "toc"));
        nav.push_attribute(("id", "toc"));
        w.write_event(Event::Start(nav))?;
        text_element(w, "h1", None, "Contents")?;

        w.write_event(Event::Start(BytesStart::new("ol")))?;
        for chapter in chapters {
            w.write_event(Event::Start(BytesStart::new("li")))?;
            let mut link = BytesStart::new("a");
            link.push_attribute(("href", chapter.href.as_str()));
            w.write_event(Event::Start(link))?;
            w.write_event(Event::Text(BytesText::new(&xml_safe(&chapter.title))))?;
            w.write_event(Event::End(BytesEnd::new("a")))?;
            w.write_event(Event::End(BytesEnd::new("li")))?;
        }
        w.write_event(Event::End(BytesEnd::new("ol")))?;

        w.write_event(Event::End(BytesEnd::new("nav")))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_safe_strips_control_characters() {
        assert_eq!(xml_safe("a\u{1}b\tc\n"), "ab\tc\n");
        assert_eq!(xml_safe("esc\u{1b}[0m"), "esc[0m");
    }

    #[test]
    fn test_text_is_escaped() {
        let body = xhtml_document("t", |w| text_element(w, "pre", None, "<a & b>")).unwrap();
        let xhtml = String::from_utf8(body).unwrap();
        assert!(xhtml.contains("&lt;a &amp; b&gt;"));
    }
}
