use std::collections::{BTreeMap, BTreeSet};

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str};

use crate::fonts::{EmbeddedFace, FontSet, Weight};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextState {
    pub weight: Weight,
    pub size: f32,
    /// Fill gray level, 0.0 = black.
    pub gray: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            weight: Weight::Regular,
            size: 12.0,
            gray: 0.0,
        }
    }
}

/// One `Tj` worth of text. `y` is the baseline measured from the top edge.
#[derive(Clone, Debug, PartialEq)]
pub struct TextOp {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub state: TextState,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageOps {
    pub texts: Vec<TextOp>,
}

impl PageOps {
    pub fn text(&self) -> String {
        self.texts.iter().map(|t| t.text.as_str()).collect()
    }
}

/// A stateful drawing surface in the style of a canvas API: set a font, draw
/// text at a position, add pages. Drawing is recorded and serialized later.
pub struct Canvas<'f> {
    fonts: &'f FontSet,
    pages: Vec<PageOps>,
    state: TextState,
}

impl<'f> Canvas<'f> {
    pub fn new(fonts: &'f FontSet) -> Self {
        Self {
            fonts,
            pages: vec![PageOps::default()],
            state: TextState::default(),
        }
    }

    pub fn fonts(&self) -> &'f FontSet {
        self.fonts
    }

    pub fn add_page(&mut self) {
        self.pages.push(PageOps::default());
    }

    pub fn state(&self) -> TextState {
        self.state
    }

    pub fn restore(&mut self, state: TextState) {
        self.state = state;
    }

    pub fn set_font(&mut self, weight: Weight, size: f32) {
        self.state.weight = weight;
        self.state.size = size;
    }

    pub fn set_gray(&mut self, gray: f32) {
        self.state.gray = gray;
    }

    pub fn draw_text(&mut self, text: &str, x: f32, y: f32) {
        if text.is_empty() {
            return;
        }
        let state = self.state;
        if let Some(page) = self.pages.last_mut() {
            page.texts.push(TextOp {
                x,
                y,
                text: text.to_string(),
                state,
            });
        }
    }

    pub fn into_pages(self) -> Vec<PageOps> {
        self.pages
    }
}

/// Serialize recorded pages into a PDF file.
pub fn write_pdf(pages: &[PageOps], fonts: &FontSet, width: f32, height: f32) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();

    let mut used_chars: BTreeMap<Weight, BTreeSet<char>> = BTreeMap::new();
    for op in pages.iter().flat_map(|p| p.texts.iter()) {
        used_chars
            .entry(op.state.weight)
            .or_default()
            .extend(op.text.chars());
    }
    if used_chars.is_empty() {
        used_chars.entry(Weight::Regular).or_default().insert(' ');
    }

    let mut embedded: BTreeMap<Weight, EmbeddedFace> = BTreeMap::new();
    for (i, (weight, chars)) in used_chars.iter().enumerate() {
        let face = fonts.face(*weight).embed(&mut pdf, format!("F{}", i + 1), &mut alloc, chars);
        embedded.insert(*weight, face);
    }

    let page_ids: Vec<Ref> = pages.iter().map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = pages.iter().map(|_| alloc()).collect();

    for (page, content_id) in pages.iter().zip(&content_ids) {
        let mut content = Content::new();
        let mut gray = 0.0f32;
        for op in &page.texts {
            let Some(face) = embedded.get(&op.state.weight) else {
                continue;
            };
            if op.state.gray != gray {
                content.set_fill_gray(op.state.gray);
                gray = op.state.gray;
            }
            content.begin_text();
            content.set_font(Name(face.pdf_name.as_bytes()), op.state.size);
            content.next_line(op.x, height - op.y);
            content.show(Str(&face.encode(&op.text)));
            content.end_text();
        }
        let raw = content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(*content_id, &compressed).filter(Filter::FlateDecode);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(pages.len() as i32);

    for (page_id, content_id) in page_ids.iter().zip(&content_ids) {
        let mut page = pdf.page(*page_id);
        page.media_box(Rect::new(0.0, 0.0, width, height))
            .parent(pages_id)
            .contents(*content_id);
        let mut resources = page.resources();
        let mut font_dict = resources.fonts();
        for face in embedded.values() {
            font_dict.pair(Name(face.pdf_name.as_bytes()), face.font_ref);
        }
    }

    pdf.finish()
}
