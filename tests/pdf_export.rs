mod common;

use rayon::prelude::*;
use std::fs;

use folio::fonts::{FontSet, Weight};
use folio::model::runs_text;
use folio::pdf::{self, PAGE_HEIGHT_PT, PAGE_WIDTH_PT, PageOps, PdfOptions};
use folio::{Block, DocumentSettings, Error, Margins, Run, parse_blocks};

fn options_with_header(header: &str) -> PdfOptions {
    PdfOptions {
        header_text: Some(header.into()),
        ..PdfOptions::default()
    }
}

fn body_ops(page: &PageOps) -> impl Iterator<Item = &pdf::TextOp> {
    // The running header is the only 9pt text.
    page.texts.iter().filter(|t| t.state.size != 9.0)
}

#[test]
fn empty_document_is_rejected_before_drawing() {
    let err = pdf::render(&[], &PdfOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyDocument));
    assert!(err.to_string().contains("empty document"));
}

#[test]
fn output_is_a_pdf_file() {
    let bytes = pdf::render(&parse_blocks("<p>hello</p>"), &PdfOptions::default()).expect("render");
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(common::pdf_page_count(&bytes), 1);
}

#[test]
fn wrapped_paragraph_draws_every_character_once() {
    let runs = vec![
        Run::plain("Lorem ipsum dolor sit amet, consectetur adipiscing elit.  Double  spaces stay. ".repeat(8)),
        Run::bold("Bold middle section that also wraps around the line end more than once. ".repeat(3)),
        Run::plain("and\u{a0}a plain tail"),
    ];
    let blocks = vec![Block::Paragraph { runs: runs.clone() }];
    let fonts = FontSet::standard();
    let pages = pdf::paint(&blocks, &PdfOptions::default(), &fonts).expect("paint");

    let drawn: String = pages.iter().flat_map(|p| p.texts.iter()).map(|t| t.text.as_str()).collect();
    assert_eq!(drawn, runs_text(&runs));

    let lines: std::collections::BTreeSet<u32> = pages[0].texts.iter().map(|t| t.y.to_bits()).collect();
    assert!(lines.len() > 3, "paragraph should wrap");
}

#[test]
fn bold_runs_use_the_bold_face() {
    let blocks = parse_blocks("<p>plain <strong>loud</strong> plain</p>");
    let fonts = FontSet::standard();
    let pages = pdf::paint(&blocks, &PdfOptions::default(), &fonts).expect("paint");
    let weights: Vec<(&str, Weight)> = pages[0]
        .texts
        .iter()
        .map(|t| (t.text.as_str(), t.state.weight))
        .collect();
    assert_eq!(
        weights,
        [("plain ", Weight::Regular), ("loud", Weight::Bold), (" plain", Weight::Regular)]
    );
}

#[test]
fn lines_stay_inside_the_margins() {
    let html = common::paragraphs(30, 60);
    let options = PdfOptions {
        margins: Margins {
            top: 50.0,
            bottom: 60.0,
            left: 40.0,
            right: 90.0,
        },
        ..PdfOptions::default()
    };
    let fonts = FontSet::standard();
    let pages = pdf::paint(&parse_blocks(&html), &options, &fonts).expect("paint");
    assert!(pages.len() > 1);

    let right_edge = PAGE_WIDTH_PT - 90.0;
    for page in &pages {
        for op in &page.texts {
            let width = fonts.text_width(op.state.weight, &op.text, op.state.size);
            assert!(op.x >= 40.0);
            assert!(op.x + width <= right_edge + 0.01, "{:?} overflows", op.text);
            assert!(op.y <= PAGE_HEIGHT_PT - 60.0 + 0.01);
        }
    }
}

#[test]
fn heading_sizes_by_level() {
    let html = "<h1>a</h1><h2>b</h2><h3>c</h3><h4>d</h4><h5>e</h5><h6>f</h6>";
    let fonts = FontSet::standard();
    let pages = pdf::paint(&parse_blocks(html), &PdfOptions::default(), &fonts).expect("paint");
    let sizes: Vec<f32> = pages[0].texts.iter().map(|t| t.state.size).collect();
    assert_eq!(sizes, [22.0, 20.0, 18.0, 16.0, 14.0, 12.0]);
    assert!(pages[0].texts.iter().all(|t| t.state.weight == Weight::Bold));
}

#[test]
fn list_markers_precede_item_text() {
    let html = "<ol><li>first</li><li>second</li></ol><ul><li>dot</li></ul>";
    let fonts = FontSet::standard();
    let pages = pdf::paint(&parse_blocks(html), &PdfOptions::default(), &fonts).expect("paint");
    let texts: Vec<&str> = pages[0].texts.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, ["1. ", "first", "2. ", "second", "\u{2022}", "dot"]);

    let marker = &pages[0].texts[0];
    let item = &pages[0].texts[1];
    assert!(item.x > marker.x);
    assert_eq!(item.y, marker.y);
}

#[test]
fn header_is_redrawn_on_every_page_and_state_restored() {
    let html = format!("<h1>Report</h1>{}", common::paragraphs(80, 50));
    let fonts = FontSet::standard();
    let pages = pdf::paint(&parse_blocks(&html), &options_with_header("Confidential"), &fonts).expect("paint");
    assert!(pages.len() >= 3);

    for (i, page) in pages.iter().enumerate() {
        let header = &page.texts[0];
        assert_eq!(header.text, "Confidential", "page {}", i + 1);
        assert_eq!(header.state.size, 9.0);
        assert!(header.state.gray > 0.0);

        let next = &page.texts[1];
        assert_eq!(next.state.gray, 0.0, "page {} body is still gray", i + 1);
        assert_ne!(next.state.size, 9.0);
        assert_eq!(body_ops(page).count(), page.texts.len() - 1);
    }
}

#[test]
fn no_page_is_left_empty() {
    let html = format!("{}<h1>Tail</h1>", common::paragraphs(50, 45));
    let fonts = FontSet::standard();
    let pages = pdf::paint(&parse_blocks(&html), &options_with_header("H"), &fonts).expect("paint");
    for page in &pages {
        assert!(body_ops(page).count() > 0);
    }
}

#[test]
fn margins_without_printable_area_fail() {
    let options = PdfOptions {
        margins: Margins::uniform(400.0),
        ..PdfOptions::default()
    };
    let err = pdf::render(&parse_blocks("<p>x</p>"), &options).unwrap_err();
    assert!(matches!(err, Error::PdfGeneration(_)));
    assert!(err.to_string().starts_with("PDF Generation Failed: "));
}

#[test]
fn settings_margins_convert_from_pixels() {
    let settings = DocumentSettings {
        margins: Some(Margins::uniform(96.0)),
        ..DocumentSettings::default()
    };
    let options = PdfOptions::from_settings(&settings);
    assert_eq!(options.margins, Margins::uniform(72.0));
}

#[test]
fn non_latin_text_still_renders() {
    let bytes = pdf::render(&parse_blocks("<p>日本語 and ünïcödé</p>"), &PdfOptions::default())
        .expect("render");
    assert!(bytes.starts_with(b"%PDF-"));
}

#[test]
fn fixtures_render() {
    let _ = env_logger::try_init();
    let fixtures = common::discover_fixtures().expect("Failed to read tests/fixtures");

    let failures: Vec<String> = fixtures
        .par_iter()
        .filter_map(|fixture| {
            let name = common::case_name(fixture);
            let html = fs::read_to_string(fixture).ok()?;
            let blocks = parse_blocks(&html);
            let fonts = FontSet::standard();
            let options = options_with_header(&name);
            let pages = match pdf::paint(&blocks, &options, &fonts) {
                Ok(pages) => pages,
                Err(e) => return Some(format!("{name}: {e}")),
            };
            let bytes = match pdf::render(&blocks, &options) {
                Ok(bytes) => bytes,
                Err(e) => return Some(format!("{name}: {e}")),
            };

            let out = common::output_dir(fixture);
            fs::create_dir_all(&out).ok();
            fs::write(out.join("generated.pdf"), &bytes).ok();

            let count = common::pdf_page_count(&bytes);
            (count != pages.len()).then(|| format!("{name}: {count} pages in file, {} painted", pages.len()))
        })
        .collect();

    assert!(failures.is_empty(), "{failures:#?}");
}

#[test]
fn hard_breaks_start_new_lines() {
    let fonts = FontSet::standard();
    let pages = pdf::paint(&parse_blocks("<p>line one<br>line two</p>"), &PdfOptions::default(), &fonts)
        .expect("paint");
    let texts: Vec<&str> = pages[0].texts.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, ["line one", "line two"]);

    let (first, second) = (&pages[0].texts[0], &pages[0].texts[1]);
    assert_eq!(first.x, second.x);
    assert!(second.y > first.y);
}

#[test]
fn wide_ordered_markers_clear_the_item_text() {
    let items: String = (1..=12).map(|n| format!("<li>item {n}</li>")).collect();
    let html = format!("<ol>{items}</ol><ul><li>dot</li></ul>");
    let fonts = FontSet::standard();
    let pages = pdf::paint(&parse_blocks(&html), &PdfOptions::default(), &fonts).expect("paint");

    for pair in pages[0].texts.chunks(2) {
        let (marker, item) = (&pair[0], &pair[1]);
        let marker_end = marker.x + fonts.text_width(marker.state.weight, &marker.text, marker.state.size);
        assert!(marker_end <= item.x + 0.001, "marker {:?} ends at {marker_end} past {}", marker.text, item.x);
    }

    // Short lists keep the standard indent.
    let bullet = &pages[0].texts[24];
    let dot = &pages[0].texts[25];
    assert_eq!(bullet.x, 72.0 + 5.0);
    assert_eq!(dot.x, 72.0 + 20.0);
}
