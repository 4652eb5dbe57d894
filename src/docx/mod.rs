//! HTML to Word (`.docx`) export.
//!
//! The walker reads the markup tree directly rather than the block model used
//! for PDF, because it also has to place images and keep `div`/`blockquote`
//! content that the block parser drops. Inline formatting goes through the
//! same run collector as the PDF path.

mod images;
mod writer;

pub use images::{DefaultFetcher, EmbeddedImage, ImageFetcher, decode_data_uri, prepare_image};

use std::time::Instant;

use serde::Serialize;

use crate::config::{DocumentSettings, Margins, px_to_twips};
use crate::error::Error;
use crate::html::{Element, Node, parse_fragment};
use crate::inline::{collapse_whitespace, collect_runs};
use crate::model::Run;

/// One inch on every side.
pub const DEFAULT_MARGIN_TWIPS: u32 = 1440;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TwipMargins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Default for TwipMargins {
    fn default() -> Self {
        Self {
            top: DEFAULT_MARGIN_TWIPS,
            bottom: DEFAULT_MARGIN_TWIPS,
            left: DEFAULT_MARGIN_TWIPS,
            right: DEFAULT_MARGIN_TWIPS,
        }
    }
}

impl From<Margins> for TwipMargins {
    fn from(px: Margins) -> Self {
        Self {
            top: px_to_twips(px.top),
            bottom: px_to_twips(px.bottom),
            left: px_to_twips(px.left),
            right: px_to_twips(px.right),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WordOptions {
    /// Page margins in CSS pixels; one inch when absent.
    pub margins: Option<Margins>,
    pub header_text: Option<String>,
}

impl WordOptions {
    pub fn from_settings(settings: &DocumentSettings) -> Self {
        Self {
            margins: settings.margins,
            header_text: settings.header().map(str::to_string),
        }
    }

    pub fn twip_margins(&self) -> TwipMargins {
        self.margins.map(TwipMargins::from).unwrap_or_default()
    }
}

/// A paragraph of the output document.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Paragraph {
    /// Levels past 3 are written with the level-3 style.
    Heading { level: u8, runs: Vec<Run> },
    Text { runs: Vec<Run> },
    Bullet { runs: Vec<Run> },
    /// Index into the embedded media list.
    Image { media: usize, description: String },
    Empty,
}

/// Walk the HTML and produce Word paragraphs plus the images they reference.
/// Never produces an empty paragraph list.
pub fn build_paragraphs(
    html: &str,
    fetcher: &dyn ImageFetcher,
) -> (Vec<Paragraph>, Vec<EmbeddedImage>) {
    let fragment = parse_fragment(html);
    let mut walker = Walker {
        fetcher,
        paragraphs: Vec::new(),
        media: Vec::new(),
    };
    for node in &fragment.nodes {
        walker.node(node);
    }
    if walker.paragraphs.is_empty() {
        walker.paragraphs.push(Paragraph::Empty);
    }
    (walker.paragraphs, walker.media)
}

/// Render HTML to `.docx` bytes.
pub fn render(html: &str, options: &WordOptions, fetcher: &dyn ImageFetcher) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();
    let (paragraphs, media) = build_paragraphs(html, fetcher);
    let t_walk = t0.elapsed();

    let package = writer::Package {
        paragraphs: &paragraphs,
        media: &media,
        margins: options.twip_margins(),
        header: options
            .header_text
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty()),
    };
    let bytes = package.write().map_err(|e| {
        log::error!("DOCX export failed: {e}");
        match e {
            Error::DocxGeneration(_) => e,
            other => Error::DocxGeneration(other.to_string()),
        }
    })?;

    log::info!(
        "DOCX: {} paragraph(s), {} image(s), walk={:.1}ms, package={:.1}ms ({} bytes)",
        paragraphs.len(),
        media.len(),
        t_walk.as_secs_f64() * 1000.0,
        (t0.elapsed() - t_walk).as_secs_f64() * 1000.0,
        bytes.len(),
    );
    Ok(bytes)
}

struct Walker<'a> {
    fetcher: &'a dyn ImageFetcher,
    paragraphs: Vec<Paragraph>,
    media: Vec<EmbeddedImage>,
}

impl Walker<'_> {
    fn node(&mut self, node: &Node) {
        match node {
            Node::Element(el) => self.element(el),
            Node::Text(text) => {
                let text = collapse_whitespace(text);
                let text = text.trim();
                if !text.is_empty() {
                    self.paragraphs.push(Paragraph::Text {
                        runs: vec![Run::plain(text)],
                    });
                }
            }
        }
    }

    fn children(&mut self, el: &Element) {
        for child in &el.children {
            self.node(child);
        }
    }

    fn element(&mut self, el: &Element) {
        if let Some(level) = el.heading_level() {
            self.paragraphs.push(Paragraph::Heading {
                level: level.min(3),
                runs: collect_runs(el),
            });
            return;
        }
        match el.tag.as_str() {
            "p" | "blockquote" => self.text_with_images(el, |runs| Paragraph::Text { runs }),
            "li" => self.text_with_images(el, |runs| Paragraph::Bullet { runs }),
            "div" if el.has_direct_text() => self.text_with_images(el, |runs| Paragraph::Text { runs }),
            "br" => self.paragraphs.push(Paragraph::Empty),
            "img" => self.image(el),
            "script" | "style" | "template" | "head" => {}
            // ul, ol, div without text and anything unknown
            _ => self.children(el),
        }
    }

    /// A text paragraph, followed by any images nested inside it. An element
    /// holding only an image yields just the image.
    fn text_with_images(&mut self, el: &Element, make: impl FnOnce(Vec<Run>) -> Paragraph) {
        let mut images = Vec::new();
        find_images(el, &mut images);
        let runs = collect_runs(el);
        if images.is_empty() || !runs.iter().all(|r| r.text.trim().is_empty()) {
            self.paragraphs.push(make(runs));
        }
        for img in images {
            self.image(img);
        }
    }

    fn image(&mut self, el: &Element) {
        let alt = el.attr("alt").map(str::trim).filter(|a| !a.is_empty());
        let src = el.attr("src").map(str::trim).unwrap_or_default();

        let fetched = if src.is_empty() {
            Err(Error::image_fetch(src, "missing src"))
        } else {
            self.fetcher
                .fetch(src)
                .and_then(|bytes| prepare_image(src, bytes))
        };

        match fetched {
            Ok(image) => {
                self.media.push(image);
                self.paragraphs.push(Paragraph::Image {
                    media: self.media.len() - 1,
                    description: alt.unwrap_or_default().to_string(),
                });
            }
            Err(e) => {
                log::warn!("{e}; writing placeholder");
                self.paragraphs.push(Paragraph::Text {
                    runs: vec![Run {
                        text: format!("[{}]", alt.unwrap_or("Image")),
                        italic: true,
                        ..Default::default()
                    }],
                });
            }
        }
    }
}

fn find_images<'e>(el: &'e Element, out: &mut Vec<&'e Element>) {
    for child in el.child_elements() {
        if child.tag == "img" {
            out.push(child);
        } else {
            find_images(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_images(src: &str) -> Result<Vec<u8>, Error> {
        Err(Error::image_fetch(src, "offline"))
    }

    #[test]
    fn deep_headings_use_level_three() {
        let (paragraphs, _) = build_paragraphs("<h5>deep</h5>", &no_images);
        assert!(matches!(paragraphs[0], Paragraph::Heading { level: 3, .. }));
    }

    #[test]
    fn lists_unwrap_into_bullets() {
        let (paragraphs, _) = build_paragraphs("<ol><li>a</li><li>b</li></ol>", &no_images);
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs.iter().all(|p| matches!(p, Paragraph::Bullet { .. })));
    }

    #[test]
    fn div_with_text_is_a_paragraph_otherwise_recurses() {
        let (paragraphs, _) =
            build_paragraphs("<div>direct</div><div><p>one</p><p>two</p></div>", &no_images);
        assert_eq!(paragraphs.len(), 3);
    }

    #[test]
    fn empty_input_still_has_a_paragraph() {
        let (paragraphs, media) = build_paragraphs("", &no_images);
        assert_eq!(paragraphs, [Paragraph::Empty]);
        assert!(media.is_empty());
    }

    #[test]
    fn margins_convert_to_twips() {
        let options = WordOptions {
            margins: Some(Margins::uniform(96.0)),
            header_text: None,
        };
        assert_eq!(options.twip_margins(), TwipMargins::default());
        assert_eq!(WordOptions::default().twip_margins().left, 1440);
    }
}
