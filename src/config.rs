use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Screen pixels per inch; editor margins are stored in CSS px.
pub const PX_PER_INCH: f32 = 96.0;
pub const TWIPS_PER_INCH: f32 = 1440.0;
pub const POINTS_PER_INCH: f32 = 72.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Margins {
    pub const fn uniform(v: f32) -> Self {
        Self {
            top: v,
            bottom: v,
            left: v,
            right: v,
        }
    }

    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            top: f(self.top),
            bottom: f(self.bottom),
            left: f(self.left),
            right: f(self.right),
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Margins::uniform(PX_PER_INCH)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageNumberPosition {
    HeaderRight,
    FooterLeft,
    #[default]
    FooterCenter,
    FooterRight,
}

impl PageNumberPosition {
    pub fn in_header(self) -> bool {
        matches!(self, PageNumberPosition::HeaderRight)
    }
}

/// Per-document settings as kept by the surrounding application.
/// Margins are in CSS pixels; each consumer converts to its own unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentSettings {
    pub margins: Option<Margins>,
    pub header_text: Option<String>,
    pub footer_text: Option<String>,
    pub page_number_position: PageNumberPosition,
    /// Installed font family for PDF text; Helvetica when absent.
    pub font_family: Option<String>,
}

impl DocumentSettings {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Header text with blank values treated as absent.
    pub fn header(&self) -> Option<&str> {
        self.header_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn footer(&self) -> Option<&str> {
        self.footer_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margins: Margins,
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        self.width - self.margins.left - self.margins.right
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margins.top - self.margins.bottom
    }
}

pub fn px_to_twips(px: f32) -> u32 {
    (px / PX_PER_INCH * TWIPS_PER_INCH).round().max(0.0) as u32
}

pub fn px_to_points(px: f32) -> f32 {
    px / PX_PER_INCH * POINTS_PER_INCH
}
