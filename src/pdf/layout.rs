use crate::fonts::{FontSet, Weight};
use crate::model::Run;

/// Split text into alternating word and whitespace tokens. Concatenating the
/// tokens gives back the input unchanged.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;
    for (idx, ch) in text.char_indices() {
        let is_space = ch.is_whitespace();
        if in_space.is_some_and(|prev| prev != is_space) {
            tokens.push(&text[start..idx]);
            start = idx;
        }
        in_space = Some(is_space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// A stretch of one line drawn with a single face.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub text: String,
    pub weight: Weight,
    /// x relative to the line start.
    pub x_offset: f32,
    pub width: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextLine {
    pub segments: Vec<Segment>,
    pub width: f32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    fn push(&mut self, token: &str, weight: Weight, width: f32) {
        match self.segments.last_mut() {
            Some(last) if last.weight == weight => {
                last.text.push_str(token);
                last.width += width;
            }
            _ => self.segments.push(Segment {
                text: token.to_string(),
                weight,
                x_offset: self.width,
                width,
            }),
        }
        self.width += width;
    }
}

/// Greedily pack the runs' tokens into lines no wider than `max_width`.
///
/// A token that does not fit flushes the current line first; a token wider
/// than a whole line still gets a line of its own. Whitespace tokens are kept
/// so every character of the input is drawn exactly once. Newlines (hard
/// breaks) are not drawn; each one ends the current line, so consecutive
/// breaks leave empty lines.
pub fn wrap_runs(runs: &[Run], fonts: &FontSet, font_size: f32, max_width: f32) -> Vec<TextLine> {
    let mut lines = Vec::new();
    let mut current = TextLine::default();

    for run in runs {
        let weight = Weight::from_bold(run.bold);
        for token in tokenize(&run.text) {
            if token.contains('\n') {
                for _ in token.matches('\n') {
                    lines.push(std::mem::take(&mut current));
                }
                continue;
            }
            let width = fonts.text_width(weight, token, font_size);
            if !current.segments.is_empty() && current.width + width > max_width {
                lines.push(std::mem::take(&mut current));
            }
            current.push(token, weight, width);
        }
    }

    if !current.segments.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wrap a single-face string, used for headings.
pub fn wrap_text(
    text: &str,
    weight: Weight,
    fonts: &FontSet,
    font_size: f32,
    max_width: f32,
) -> Vec<TextLine> {
    let run = Run {
        text: text.to_string(),
        bold: weight == Weight::Bold,
        ..Default::default()
    };
    wrap_runs(std::slice::from_ref(&run), fonts, font_size, max_width)
}
