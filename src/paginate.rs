//! Editing-time pagination.
//!
//! The editor shows a continuous document; this module estimates where printed
//! pages would end and produces header / footer / gap decorations keyed by
//! document position. Nothing here touches document content, and every pass
//! starts from scratch.

use serde::Serialize;

use crate::config::{DocumentSettings, Margins, PageNumberPosition};
use crate::html::{Fragment, Node, parse_fragment};
use crate::inline::collapse_whitespace;

/// A4 at 96 dpi.
pub const PAGE_WIDTH_PX: f32 = 794.0;
pub const PAGE_HEIGHT_PX: f32 = 1123.0;
pub const PAGE_GAP_PX: f32 = 40.0;

/// One top-level block of the live document.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotNode {
    /// Document position of the node's opening boundary.
    pub pos: usize,
    pub tag: String,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentSnapshot {
    pub nodes: Vec<SnapshotNode>,
    /// Position just past the last node.
    pub end: usize,
}

impl DocumentSnapshot {
    pub fn from_html(html: &str) -> Self {
        Self::from_fragment(&parse_fragment(html))
    }

    /// Every top-level block occupies its text length plus one opening and one
    /// closing boundary, matching the editor's position model. Source
    /// indentation is not text, so whitespace collapses the way it renders.
    pub fn from_fragment(fragment: &Fragment) -> Self {
        let mut pos = 0;
        let mut nodes = Vec::new();
        for node in &fragment.nodes {
            let (tag, text) = match node {
                Node::Element(el) => (el.tag.clone(), el.text_content()),
                Node::Text(t) if !t.trim().is_empty() => ("#text".to_string(), t.clone()),
                Node::Text(_) => continue,
            };
            let text = collapse_whitespace(&text).trim().to_string();
            let size = text.chars().count() + 2;
            nodes.push(SnapshotNode { pos, tag, text });
            pos += size;
        }
        Self { nodes, end: pos }
    }
}

/// Strategy for guessing how tall a block renders, in the same unit as the page
/// geometry. The break logic only depends on this trait, so a real text shaper
/// can replace the character-count heuristic.
pub trait HeightEstimator {
    fn estimate_height(&self, node: &SnapshotNode, page_width: f32) -> f32;
}

/// `ceil(chars / chars_per_line) * line_height + padding`; an empty block
/// counts as one bare line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharCountEstimator {
    pub chars_per_line: usize,
    pub line_height: f32,
    pub padding: f32,
}

impl Default for CharCountEstimator {
    fn default() -> Self {
        Self {
            chars_per_line: 80,
            line_height: 24.0,
            padding: 16.0,
        }
    }
}

impl HeightEstimator for CharCountEstimator {
    fn estimate_height(&self, node: &SnapshotNode, _page_width: f32) -> f32 {
        let chars = node.text.trim().chars().count();
        if chars == 0 {
            return self.line_height;
        }
        let lines = chars.div_ceil(self.chars_per_line.max(1));
        lines as f32 * self.line_height + self.padding
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaginationConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margins: Margins,
    pub page_number_position: PageNumberPosition,
    pub header_text: Option<String>,
    pub footer_text: Option<String>,
    pub page_gap: f32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_width: PAGE_WIDTH_PX,
            page_height: PAGE_HEIGHT_PX,
            margins: Margins::default(),
            page_number_position: PageNumberPosition::default(),
            header_text: None,
            footer_text: None,
            page_gap: PAGE_GAP_PX,
        }
    }
}

impl PaginationConfig {
    pub fn from_settings(settings: &DocumentSettings) -> Self {
        Self {
            margins: settings.margins.unwrap_or_default(),
            page_number_position: settings.page_number_position,
            header_text: settings.header().map(str::to_string),
            footer_text: settings.footer().map(str::to_string),
            ..Self::default()
        }
    }

    fn bottom_limit(&self) -> f32 {
        self.page_height - self.margins.bottom
    }

    fn header(&self, page: u32) -> PageWidget {
        PageWidget {
            page,
            text: self.header_text.clone(),
            page_number: self
                .page_number_position
                .in_header()
                .then_some(Slot::Right),
        }
    }

    fn footer(&self, page: u32) -> PageWidget {
        let page_number = match self.page_number_position {
            PageNumberPosition::HeaderRight => None,
            PageNumberPosition::FooterLeft => Some(Slot::Left),
            PageNumberPosition::FooterCenter => Some(Slot::Center),
            PageNumberPosition::FooterRight => Some(Slot::Right),
        };
        PageWidget {
            page,
            text: self.footer_text.clone(),
            page_number,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWidget {
    pub page: u32,
    pub text: Option<String>,
    /// Where the page number sits inside this widget, if it shows one.
    pub page_number: Option<Slot>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DecorationKind {
    Header(PageWidget),
    Footer(PageWidget),
    Gap { height: f32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Decoration {
    pub pos: usize,
    #[serde(flatten)]
    pub kind: DecorationKind,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationSet {
    pub decorations: Vec<Decoration>,
    pub page_count: u32,
}

impl DecorationSet {
    /// Positions of the nodes that start a new page.
    pub fn break_positions(&self) -> Vec<usize> {
        self.decorations
            .iter()
            .filter(|d| matches!(d.kind, DecorationKind::Gap { .. }))
            .map(|d| d.pos)
            .collect()
    }

    pub fn headers(&self) -> impl Iterator<Item = (usize, &PageWidget)> {
        self.decorations.iter().filter_map(|d| match &d.kind {
            DecorationKind::Header(w) => Some((d.pos, w)),
            _ => None,
        })
    }

    pub fn footers(&self) -> impl Iterator<Item = (usize, &PageWidget)> {
        self.decorations.iter().filter_map(|d| match &d.kind {
            DecorationKind::Footer(w) => Some((d.pos, w)),
            _ => None,
        })
    }
}

/// Compute the full decoration set for one document state.
pub fn compute_decorations(
    snapshot: &DocumentSnapshot,
    config: &PaginationConfig,
    estimator: &dyn HeightEstimator,
) -> DecorationSet {
    let mut decorations = vec![Decoration {
        pos: 0,
        kind: DecorationKind::Header(config.header(1)),
    }];
    let mut page: u32 = 1;
    let mut current_height = config.margins.top;
    let mut page_has_content = false;

    for node in &snapshot.nodes {
        let estimated = estimator.estimate_height(node, config.page_width);
        if page_has_content && current_height + estimated > config.bottom_limit() {
            decorations.push(Decoration {
                pos: node.pos,
                kind: DecorationKind::Footer(config.footer(page)),
            });
            decorations.push(Decoration {
                pos: node.pos,
                kind: DecorationKind::Gap {
                    height: config.page_gap,
                },
            });
            page += 1;
            decorations.push(Decoration {
                pos: node.pos,
                kind: DecorationKind::Header(config.header(page)),
            });
            current_height = config.margins.top + estimated;
        } else {
            current_height += estimated;
        }
        page_has_content = true;
    }

    decorations.push(Decoration {
        pos: snapshot.end,
        kind: DecorationKind::Footer(config.footer(page)),
    });

    DecorationSet {
        decorations,
        page_count: page,
    }
}

/// Holds the decorations currently shown by the editor and swaps them wholesale
/// whenever the document changes.
pub struct Paginator {
    config: PaginationConfig,
    estimator: Box<dyn HeightEstimator>,
    current: DecorationSet,
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Self {
        Self::with_estimator(config, Box::new(CharCountEstimator::default()))
    }

    pub fn with_estimator(config: PaginationConfig, estimator: Box<dyn HeightEstimator>) -> Self {
        Self {
            config,
            estimator,
            current: DecorationSet::default(),
        }
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.current
    }

    /// Recompute from the given snapshot. Returns true when the visible
    /// decorations changed.
    pub fn refresh(&mut self, snapshot: &DocumentSnapshot) -> bool {
        let next = compute_decorations(snapshot, &self.config, self.estimator.as_ref());
        if next == self.current {
            return false;
        }
        log::debug!(
            "pagination: {} page(s), {} decoration(s)",
            next.page_count,
            next.decorations.len()
        );
        self.current = next;
        true
    }

    pub fn refresh_html(&mut self, html: &str) -> bool {
        self.refresh(&DocumentSnapshot::from_html(html))
    }
}
