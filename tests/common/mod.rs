#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::{fs, io};

use base64::Engine;

pub fn case_name(fixture: &Path) -> String {
    fixture
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

/// Output directory: tests/output/<case>/
pub fn output_dir(fixture: &Path) -> PathBuf {
    PathBuf::from("tests/output").join(case_name(fixture))
}

/// Discover HTML fixtures. Filter with FOLIO_CASE (file stem).
pub fn discover_fixtures() -> io::Result<Vec<PathBuf>> {
    let case_filter = std::env::var("FOLIO_CASE").ok();
    let mut fixtures: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir("tests/fixtures")? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        if let Some(ref filter) = case_filter {
            if case_name(&path) != *filter {
                continue;
            }
        }
        fixtures.push(path);
    }
    fixtures.sort();
    Ok(fixtures)
}

pub fn read_fixture(name: &str) -> String {
    fs::read_to_string(Path::new("tests/fixtures").join(name))
        .unwrap_or_else(|e| panic!("missing fixture {name}: {e}"))
}

/// `count` paragraphs of `words` words each.
pub fn paragraphs(count: usize, words: usize) -> String {
    (0..count)
        .map(|i| {
            let body: Vec<String> = (0..words).map(|w| format!("word{}", (i + w) % 97)).collect();
            format!("<p>{}</p>", body.join(" "))
        })
        .collect()
}

/// Read one part of a generated .docx as a string.
pub fn docx_part(docx: &[u8], name: &str) -> Option<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx)).expect("docx is a zip");
    let mut file = archive.by_name(name).ok()?;
    let mut out = String::new();
    file.read_to_string(&mut out).expect("part is UTF-8");
    Some(out)
}

pub fn docx_part_names(docx: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(docx)).expect("docx is a zip");
    archive.file_names().map(str::to_string).collect()
}

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Paragraph text (concatenated `w:t`) and whether any run in it is italic,
/// for every body paragraph of document.xml.
pub fn docx_paragraphs(docx: &[u8]) -> Vec<(String, bool)> {
    let xml = docx_part(docx, "word/document.xml").expect("document.xml");
    let doc = roxmltree::Document::parse(&xml).expect("document.xml parses");
    doc.descendants()
        .filter(|n| n.has_tag_name((W_NS, "p")))
        .map(|p| {
            let text: String = p
                .descendants()
                .filter(|n| n.has_tag_name((W_NS, "t")))
                .filter_map(|n| n.text())
                .collect();
            let italic = p.descendants().any(|n| n.has_tag_name((W_NS, "i")));
            (text, italic)
        })
        .collect()
}

/// Number of `/Type /Page` objects in a PDF file.
pub fn pdf_page_count(pdf: &[u8]) -> usize {
    let needle = b"/Type /Page";
    pdf.windows(needle.len() + 1)
        .filter(|w| &w[..needle.len()] == needle && w[needle.len()] != b's')
        .count()
}

/// A small valid PNG as a data URI.
pub fn png_data_uri() -> String {
    let img = image::RgbImage::from_pixel(4, 3, image::Rgb([200, 40, 40]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
