mod canvas;
mod layout;

pub use canvas::{Canvas, PageOps, TextOp, TextState};
pub use layout::{Segment, TextLine, tokenize, wrap_runs, wrap_text};

use crate::config::{DocumentSettings, Margins, PageGeometry, px_to_points};
use crate::error::Error;
use crate::fonts::{FontSet, Weight};
use crate::model::{Block, ListItem, Run};

/// A4 in points.
pub const PAGE_WIDTH_PT: f32 = 595.28;
pub const PAGE_HEIGHT_PT: f32 = 841.89;

const HEADING_SIZES: [f32; 6] = [22.0, 20.0, 18.0, 16.0, 14.0, 12.0];
const HEADING_SPACING: f32 = 10.0;
const BODY_SIZE: f32 = 12.0;
const LINE_HEIGHT_FACTOR: f32 = 1.2;
const PARAGRAPH_SPACING: f32 = 6.0;
const LIST_ITEM_SPACING: f32 = 2.0;
const LIST_MARKER_OFFSET: f32 = 5.0;
const LIST_MARKER_WIDTH: f32 = 20.0;
const HEADER_BASELINE: f32 = 30.0;
const HEADER_SIZE: f32 = 9.0;
const HEADER_GRAY: f32 = 0.47;
const BULLET: &str = "\u{2022}";

pub fn heading_size(level: u8) -> f32 {
    match level {
        1..=6 => HEADING_SIZES[level as usize - 1],
        _ => BODY_SIZE,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PdfOptions {
    /// Margins in points.
    pub margins: Margins,
    pub header_text: Option<String>,
    /// Installed font family to embed instead of Helvetica.
    pub font_family: Option<String>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            margins: Margins::uniform(72.0),
            header_text: None,
            font_family: None,
        }
    }
}

impl PdfOptions {
    pub fn from_settings(settings: &DocumentSettings) -> Self {
        Self {
            margins: settings
                .margins
                .map_or(Margins::uniform(72.0), |m| m.map(px_to_points)),
            header_text: settings.header().map(str::to_string),
            font_family: settings.font_family.clone(),
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        PageGeometry {
            width: PAGE_WIDTH_PT,
            height: PAGE_HEIGHT_PT,
            margins: self.margins,
        }
    }
}

/// Render blocks to PDF bytes.
///
/// An empty block list fails with [`Error::EmptyDocument`] before anything is
/// drawn; any later failure is logged and reported as
/// [`Error::PdfGeneration`].
pub fn render(blocks: &[Block], options: &PdfOptions) -> Result<Vec<u8>, Error> {
    if blocks.is_empty() {
        return Err(Error::EmptyDocument);
    }
    let t0 = std::time::Instant::now();
    let fonts = FontSet::load(options.font_family.as_deref());

    let result = paint(blocks, options, &fonts).map(|pages| {
        let t_paint = t0.elapsed();
        let bytes = canvas::write_pdf(&pages, &fonts, PAGE_WIDTH_PT, PAGE_HEIGHT_PT);
        log::info!(
            "PDF: {} block(s) -> {} page(s), paint={:.1}ms, write={:.1}ms ({} bytes)",
            blocks.len(),
            pages.len(),
            t_paint.as_secs_f64() * 1000.0,
            (t0.elapsed() - t_paint).as_secs_f64() * 1000.0,
            bytes.len(),
        );
        bytes
    });

    result.map_err(|e| {
        log::error!("PDF export failed: {e}");
        match e {
            Error::PdfGeneration(_) | Error::EmptyDocument => e,
            other => Error::PdfGeneration(other.to_string()),
        }
    })
}

/// Lay blocks out onto pages without serializing them.
pub fn paint(blocks: &[Block], options: &PdfOptions, fonts: &FontSet) -> Result<Vec<PageOps>, Error> {
    if blocks.is_empty() {
        return Err(Error::EmptyDocument);
    }
    let geometry = options.geometry();
    validate_geometry(&geometry)?;

    let mut painter = Painter::new(fonts, geometry, options.header_text.as_deref());
    for block in blocks {
        match block {
            Block::Heading { level, text } => painter.heading(*level, text),
            Block::Paragraph { runs } => painter.paragraph(runs),
            Block::List { ordered, items } => painter.list(*ordered, items),
        }
    }
    Ok(painter.canvas.into_pages())
}

fn validate_geometry(geometry: &PageGeometry) -> Result<(), Error> {
    let m = geometry.margins;
    if [m.top, m.bottom, m.left, m.right]
        .iter()
        .any(|v| !v.is_finite() || *v < 0.0)
    {
        return Err(Error::PdfGeneration(format!(
            "invalid page margins {m:?}"
        )));
    }
    if geometry.content_width() <= LIST_MARKER_WIDTH
        || geometry.content_height() < BODY_SIZE * LINE_HEIGHT_FACTOR
    {
        return Err(Error::PdfGeneration(
            "page margins leave no printable area".into(),
        ));
    }
    Ok(())
}

struct Painter<'a> {
    canvas: Canvas<'a>,
    geometry: PageGeometry,
    header: Option<&'a str>,
    cursor_y: f32,
}

impl<'a> Painter<'a> {
    fn new(fonts: &'a FontSet, geometry: PageGeometry, header: Option<&'a str>) -> Self {
        let mut painter = Self {
            canvas: Canvas::new(fonts),
            geometry,
            header: header.map(str::trim).filter(|h| !h.is_empty()),
            cursor_y: geometry.margins.top,
        };
        painter.draw_header();
        painter
    }

    fn max_line_width(&self) -> f32 {
        self.geometry.content_width()
    }

    fn draw_header(&mut self) {
        let Some(header) = self.header else {
            return;
        };
        let saved = self.canvas.state();
        self.canvas.set_font(Weight::Regular, HEADER_SIZE);
        self.canvas.set_gray(HEADER_GRAY);
        self.canvas
            .draw_text(header, self.geometry.margins.left, HEADER_BASELINE);
        self.canvas.restore(saved);
    }

    /// The only place pages are added. A fresh page always accepts content,
    /// even content taller than the page.
    fn ensure_space(&mut self, required: f32) {
        let at_top = self.cursor_y <= self.geometry.margins.top;
        if !at_top && self.cursor_y + required > self.geometry.height - self.geometry.margins.bottom {
            self.canvas.add_page();
            self.cursor_y = self.geometry.margins.top;
            self.draw_header();
        }
    }

    fn heading(&mut self, level: u8, text: &str) {
        let size = heading_size(level);
        let line_h = size * LINE_HEIGHT_FACTOR;
        let lines = wrap_text(text, Weight::Bold, self.canvas.fonts(), size, self.max_line_width());

        self.cursor_y += HEADING_SPACING;
        self.ensure_space(line_h);
        self.draw_lines(&lines, 0.0, size, None);
        self.cursor_y += HEADING_SPACING;
    }

    fn paragraph(&mut self, runs: &[Run]) {
        let lines = wrap_runs(runs, self.canvas.fonts(), BODY_SIZE, self.max_line_width());
        self.draw_lines(&lines, 0.0, BODY_SIZE, None);
        self.cursor_y += PARAGRAPH_SPACING;
    }

    /// Item text starts `LIST_MARKER_WIDTH` in, or further when the widest
    /// marker (say "100. ") would run into it.
    fn list(&mut self, ordered: bool, items: &[ListItem]) {
        let markers: Vec<String> = (1..=items.len())
            .map(|n| if ordered { format!("{n}. ") } else { BULLET.to_string() })
            .collect();
        let fonts = self.canvas.fonts();
        let widest = markers
            .iter()
            .map(|m| fonts.text_width(Weight::Regular, m, BODY_SIZE))
            .fold(0.0, f32::max);
        let indent = LIST_MARKER_WIDTH.max(LIST_MARKER_OFFSET + widest);

        let max_width = self.max_line_width() - indent;
        for (item, marker) in items.iter().zip(&markers) {
            let lines = wrap_runs(&item.runs, fonts, BODY_SIZE, max_width);
            self.draw_lines(&lines, indent, BODY_SIZE, Some(marker.as_str()));
            self.cursor_y += LIST_ITEM_SPACING;
        }
        self.cursor_y += PARAGRAPH_SPACING;
    }

    /// Draw wrapped lines at `indent` from the left margin, checking for a page
    /// break before each one. `marker` goes in front of the first line.
    fn draw_lines(&mut self, lines: &[TextLine], indent: f32, size: f32, marker: Option<&str>) {
        let line_h = size * LINE_HEIGHT_FACTOR;
        let left = self.geometry.margins.left;
        for (i, line) in lines.iter().enumerate() {
            self.ensure_space(line_h);
            let baseline = self.cursor_y + size;
            if i == 0
                && let Some(marker) = marker
            {
                self.canvas.set_font(Weight::Regular, size);
                self.canvas.draw_text(marker, left + LIST_MARKER_OFFSET, baseline);
            }
            for segment in &line.segments {
                self.canvas.set_font(segment.weight, size);
                self.canvas
                    .draw_text(&segment.text, left + indent + segment.x_offset, baseline);
            }
            self.cursor_y += line_h;
        }
    }
}
