use serde::Serialize;

/// A span of text sharing one formatting state.
///
/// Both exporters consume this type: the PDF path only looks at `bold`, the Word
/// path uses every flag.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub highlight: bool,
    /// Explicit font size in points from an inline `font-size: Npt` style.
    pub size: Option<f32>,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            ..Default::default()
        }
    }

    /// A hard line break from `<br>`. It carries no drawable text.
    pub fn line_break() -> Self {
        Self::plain("\n")
    }

    pub fn is_line_break(&self) -> bool {
        self.text == "\n"
    }

    /// Word run size in half-points; 12pt when no size was given.
    pub fn half_points(&self) -> u32 {
        self.size.map_or(24, |pt| (pt * 2.0).round().max(1.0) as u32)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListItem {
    pub runs: Vec<Run>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph { runs: Vec<Run> },
    List { ordered: bool, items: Vec<ListItem> },
}

impl Block {
    pub fn plain_text(&self) -> String {
        match self {
            Block::Heading { text, .. } => text.clone(),
            Block::Paragraph { runs } => runs_text(runs),
            Block::List { items, .. } => items
                .iter()
                .map(|item| runs_text(&item.runs))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

pub fn runs_text(runs: &[Run]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

/// True when runs carry no visible text.
pub fn is_blank(runs: &[Run]) -> bool {
    runs.iter().all(|r| r.text.trim().is_empty())
}
