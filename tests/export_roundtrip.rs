//! Exporter round-trips through the public API

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use dirscan::export::{Compression, CSV_COLUMNS};
use dirscan::{CancelFlag, ExportError, NoProgress, ReportFormat, ScanOptions, ScanRun, Scanner};
use tempfile::tempdir;

fn scan(root: &Path) -> ScanRun {
    let options = ScanOptions {
        recursive: true,
        max_content_bytes: 64,
        ..ScanOptions::default()
    };
    Scanner::new(options)
        .scan(root, &mut NoProgress, &CancelFlag::new())
        .expect("scan")
}

// Helper function to create a directory with awkward content
fn setup_tree(root: &Path) -> io::Result<()> {
    fs::write(root.join("plain.txt"), "hello\nworld\n")?;
    fs::write(root.join("quoted.csv"), "a,b\n\"quoted\", value\n")?;
    fs::write(root.join("unicode.md"), "héllo wörld ✓ <tag> & more")?;
    fs::write(root.join("long.log"), "z".repeat(500))?;
    fs::write(root.join("blob.bin"), [0u8, 159, 146, 150, 0, 1])?;
    fs::create_dir(root.join("sub"))?;
    fs::write(root.join("sub").join("inner.rs"), "fn main() {}\n")?;
    Ok(())
}

#[test]
fn json_round_trip_keeps_every_file_in_order() -> io::Result<()> {
    let src = tempdir()?;
    setup_tree(src.path())?;
    let out = tempdir()?;
    let run = scan(src.path());

    let destination = out.path().join("report.json");
    ReportFormat::Json
        .exporter()
        .export(&run, &destination)
        .expect("export");

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&destination)?)?;
    let files = json["files"].as_array().expect("files array");
    assert_eq!(files.len(), run.total_files_considered());

    let paths: Vec<PathBuf> = files
        .iter()
        .map(|f| PathBuf::from(f["path"].as_str().unwrap()))
        .collect();
    let expected: Vec<PathBuf> = run.records().iter().map(|r| r.path.clone()).collect();
    assert_eq!(paths, expected);

    let relative: Vec<&str> = files
        .iter()
        .map(|f| f["relative_path"].as_str().unwrap())
        .collect();
    assert!(relative.contains(&Path::new("sub").join("inner.rs").to_str().unwrap()));

    let metadata = &json["metadata"];
    assert_eq!(metadata["total_files_considered"], run.total_files_considered());
    assert_eq!(metadata["total_files_included"], run.total_files_included());
    assert_eq!(metadata["incomplete"], false);

    let long = files.iter().find(|f| f["name"] == "long.log").unwrap();
    assert_eq!(long["truncated"], true);
    assert_eq!(long["content"].as_str().unwrap().len(), 64);
    Ok(())
}

#[test]
fn csv_round_trip_preserves_content_and_order() -> io::Result<()> {
    let src = tempdir()?;
    setup_tree(src.path())?;
    let out = tempdir()?;
    let run = scan(src.path());

    let destination = out.path().join("report.csv");
    ReportFormat::Csv
        .exporter()
        .export(&run, &destination)
        .expect("export");

    let mut reader = csv::Reader::from_path(&destination)?;
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    assert_eq!(headers, CSV_COLUMNS);

    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), run.total_files_considered());

    for (row, record) in rows.iter().zip(run.records()) {
        assert_eq!(PathBuf::from(&row[0]), record.path);
        assert_eq!(&row[1], record.status().to_string());
        assert_eq!(&row[10], record.content_or_placeholder());
    }

    let quoted = rows.iter().find(|r| r[0].ends_with("quoted.csv")).unwrap();
    assert_eq!(&quoted[10], "a,b\n\"quoted\", value\n");
    Ok(())
}

#[test]
fn empty_run_exports_to_every_format() -> io::Result<()> {
    let src = tempdir()?;
    let out = tempdir()?;
    let run = scan(src.path());
    assert_eq!(run.total_files_considered(), 0);

    for format in ReportFormat::ALL {
        let destination = out.path().join(format!("empty.{}", format.extension()));
        format
            .exporter()
            .export(&run, &destination)
            .unwrap_or_else(|err| panic!("{} export failed: {}", format, err));
        assert!(fs::metadata(&destination)?.len() > 0, "{} is empty", format);
    }

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.path().join("empty.json"))?)?;
    assert_eq!(json["files"].as_array().map(Vec::len), Some(0));

    let mut reader = csv::Reader::from_path(out.path().join("empty.csv"))?;
    assert_eq!(reader.records().count(), 0);

    let pdf = lopdf::Document::load(out.path().join("empty.pdf")).expect("valid pdf");
    assert_eq!(pdf.get_pages().len(), 1);

    let txt = fs::read_to_string(out.path().join("empty.txt"))?;
    assert!(txt.contains("No files were found"));

    assert_epub_structure(&out.path().join("empty.epub"), 0);
    Ok(())
}

#[test]
fn pdf_and_epub_contain_every_file() -> io::Result<()> {
    let src = tempdir()?;
    setup_tree(src.path())?;
    let out = tempdir()?;
    let run = scan(src.path());

    let pdf_path = out.path().join("report.pdf");
    ReportFormat::Pdf.exporter().export(&run, &pdf_path).expect("pdf");
    let pdf = lopdf::Document::load(&pdf_path).expect("valid pdf");
    assert!(!pdf.get_pages().is_empty());

    let epub_path = out.path().join("report.epub");
    ReportFormat::Epub.exporter().export(&run, &epub_path).expect("epub");
    assert_epub_structure(&epub_path, run.total_files_considered());
    Ok(())
}

fn assert_epub_structure(path: &Path, chapters: usize) {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).expect("valid zip");

    {
        let mut mimetype = archive.by_index(0).unwrap();
        assert_eq!(mimetype.name(), "mimetype");
        assert_eq!(mimetype.compression(), zip::CompressionMethod::Stored);
        let mut text = String::new();
        mimetype.read_to_string(&mut text).unwrap();
        assert_eq!(text, "application/epub+zip");
    }

    let names: Vec<String> = archive.file_names().map(String::from).collect();
    for required in [
        "META-INF/container.xml",
        "OEBPS/content.opf",
        "OEBPS/nav.xhtml",
        "OEBPS/summary.xhtml",
    ] {
        assert!(names.iter().any(|n| *n == required), "missing {}", required);
    }
    let file_chapters = names.iter().filter(|n| n.starts_with("OEBPS/file_")).count();
    assert_eq!(file_chapters, chapters);
}

#[test]
fn rejected_destination_leaves_no_file() -> io::Result<()> {
    let src = tempdir()?;
    setup_tree(src.path())?;
    let out = tempdir()?;
    let run = scan(src.path());

    let result = ReportFormat::Pdf
        .exporter()
        .export(&run, &out.path().join("report.txt"));
    assert!(matches!(result, Err(ExportError::WrongExtension { .. })));
    assert_eq!(fs::read_dir(out.path())?.count(), 0);
    Ok(())
}

#[test]
fn export_replaces_existing_file_without_leftovers() -> io::Result<()> {
    let src = tempdir()?;
    setup_tree(src.path())?;
    let out = tempdir()?;
    let run = scan(src.path());

    let destination = out.path().join("report.txt");
    fs::write(&destination, "old report")?;
    ReportFormat::Txt
        .exporter()
        .export(&run, &destination)
        .expect("export");

    let text = fs::read_to_string(&destination)?;
    assert!(text.starts_with('+'));
    assert!(text.contains("plain.txt"));
    assert!(text.contains("[binary file skipped]"));

    let names: Vec<String> = fs::read_dir(out.path())?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().to_string()))
        .collect::<io::Result<_>>()?;
    assert_eq!(names, vec!["report.txt".to_string()]);
    Ok(())
}

#[cfg(unix)]
#[test]
fn new_report_is_world_readable() -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let src = tempdir()?;
    setup_tree(src.path())?;
    let out = tempdir()?;
    let run = scan(src.path());

    let destination = out.path().join("report.json");
    ReportFormat::Json
        .exporter()
        .export(&run, &destination)
        .expect("export");

    let mode = fs::metadata(&destination)?.permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);
    Ok(())
}

#[cfg(unix)]
#[test]
fn overwritten_report_keeps_its_mode() -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let src = tempdir()?;
    setup_tree(src.path())?;
    let out = tempdir()?;
    let run = scan(src.path());

    let destination = out.path().join("report.txt");
    fs::write(&destination, "old report")?;
    fs::set_permissions(&destination, fs::Permissions::from_mode(0o640))?;

    ReportFormat::Txt
        .exporter()
        .export(&run, &destination)
        .expect("export");

    let mode = fs::metadata(&destination)?.permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
    assert!(fs::read_to_string(&destination)?.contains("plain.txt"));
    Ok(())
}

#[test]
fn compressed_reports_decode_to_the_plain_report() -> io::Result<()> {
    let src = tempdir()?;
    setup_tree(src.path())?;
    let out = tempdir()?;
    let run = scan(src.path());

    for compression in [Compression::Gzip, Compression::Bz2, Compression::Xz] {
        let destination = compression.destination(ReportFormat::Csv, &out.path().join("report"));
        compression
            .wrap(ReportFormat::Csv.exporter(), 9)
            .export(&run, &destination)
            .unwrap_or_else(|err| panic!("{} export failed: {}", compression, err));

        let file = File::open(&destination)?;
        let decoder: Box<dyn Read> = match compression {
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
            Compression::Bz2 => Box::new(bzip2::read::BzDecoder::new(file)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(file)),
            Compression::None => unreachable!(),
        };

        let mut reader = csv::Reader::from_reader(decoder);
        let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
        assert_eq!(rows.len(), run.total_files_considered(), "{}", compression);
    }

    let names: Vec<String> = fs::read_dir(out.path())?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().to_string()))
        .collect::<io::Result<_>>()?;
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"report.csv.xz".to_string()));
    Ok(())
}
