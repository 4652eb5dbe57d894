use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Weight {
    Regular,
    Bold,
}

impl Weight {
    pub fn from_bold(bold: bool) -> Self {
        if bold { Weight::Bold } else { Weight::Regular }
    }
}

/// Helvetica advance widths (1000 units/em) for ASCII 32..=126.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

fn standard_char_width(widths: &[u16; 95], bold: bool, ch: char) -> f32 {
    match ch {
        ' '..='~' => widths[ch as usize - 32] as f32,
        '\u{00A0}' | '\t' | '\n' | '\r' => widths[0] as f32,
        '\u{2022}' => 350.0,
        '\u{2013}' => 556.0,
        '\u{2014}' | '\u{2026}' | '\u{2030}' => 1000.0,
        '\u{2018}' | '\u{2019}' | '\u{201A}' => {
            if bold {
                278.0
            } else {
                222.0
            }
        }
        '\u{201C}' | '\u{201D}' | '\u{201E}' => {
            if bold {
                500.0
            } else {
                333.0
            }
        }
        _ => 556.0,
    }
}

enum FaceSource {
    Standard {
        base_font: &'static str,
        widths: &'static [u16; 95],
    },
    TrueType {
        family: String,
        data: Mmap,
        index: u32,
        /// Advance widths in 1000-units/em for every char the face maps.
        advances: HashMap<char, f32>,
    },
}

/// One font face used for drawing and measuring.
pub struct FontFace {
    weight: Weight,
    source: FaceSource,
}

impl FontFace {
    fn helvetica(weight: Weight) -> Self {
        let source = match weight {
            Weight::Regular => FaceSource::Standard {
                base_font: "Helvetica",
                widths: &HELVETICA_WIDTHS,
            },
            Weight::Bold => FaceSource::Standard {
                base_font: "Helvetica-Bold",
                widths: &HELVETICA_BOLD_WIDTHS,
            },
        };
        Self { weight, source }
    }

    /// Wrap a mapped TrueType face, reading its width table once.
    fn truetype(weight: Weight, family: &str, data: Mmap, index: u32) -> Self {
        let advances = match Face::parse(&data, index) {
            Ok(face) => advance_table(&face),
            Err(e) => {
                log::warn!("Could not read widths from {family}: {e}");
                HashMap::new()
            }
        };
        Self {
            weight,
            source: FaceSource::TrueType {
                family: family.to_string(),
                data,
                index,
                advances,
            },
        }
    }

    pub fn name(&self) -> &str {
        match &self.source {
            FaceSource::Standard { base_font, .. } => base_font,
            FaceSource::TrueType { family, .. } => family,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.source, FaceSource::TrueType { .. })
    }

    /// Advance width of `ch` in 1000-units/em.
    pub fn char_width_1000(&self, ch: char) -> f32 {
        match &self.source {
            FaceSource::Standard { widths, .. } => {
                standard_char_width(widths, self.weight == Weight::Bold, ch)
            }
            FaceSource::TrueType { advances, .. } => advances.get(&ch).copied().unwrap_or(500.0),
        }
    }

    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().map(|ch| self.char_width_1000(ch)).sum::<f32>() * font_size / 1000.0
    }
}

fn advance_table(face: &Face) -> HashMap<char, f32> {
    let units = face.units_per_em() as f32;
    let mut table = HashMap::new();
    let Some(cmap) = face.tables().cmap else {
        return table;
    };
    for subtable in cmap.subtables.into_iter().filter(|s| s.is_unicode()) {
        subtable.codepoints(|cp| {
            if let Some(ch) = char::from_u32(cp)
                && let Some(advance) = face.glyph_index(ch).and_then(|gid| face.glyph_hor_advance(gid))
            {
                table.entry(ch).or_insert(advance as f32 / units * 1000.0);
            }
        });
    }
    table
}

/// The regular and bold faces the PDF renderer draws with.
pub struct FontSet {
    regular: FontFace,
    bold: FontFace,
}

impl Default for FontSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl FontSet {
    /// Built-in Helvetica, needs no font files.
    pub fn standard() -> Self {
        Self {
            regular: FontFace::helvetica(Weight::Regular),
            bold: FontFace::helvetica(Weight::Bold),
        }
    }

    /// Look `family` up among installed fonts; each weight that cannot be found
    /// falls back to Helvetica on its own.
    pub fn load(family: Option<&str>) -> Self {
        let Some(family) = family.map(str::trim).filter(|f| !f.is_empty()) else {
            return Self::standard();
        };
        let t0 = std::time::Instant::now();
        let load_face = |weight: Weight| {
            find_system_face(family, weight == Weight::Bold)
                .map(|(data, index)| FontFace::truetype(weight, family, data, index))
                .unwrap_or_else(|| {
                    log::warn!("Font not found: {family} {weight:?}, using Helvetica");
                    FontFace::helvetica(weight)
                })
        };
        let set = Self {
            regular: load_face(Weight::Regular),
            bold: load_face(Weight::Bold),
        };
        log::debug!(
            "font lookup for {family}: {:.1}ms",
            t0.elapsed().as_secs_f64() * 1000.0
        );
        set
    }

    pub fn face(&self, weight: Weight) -> &FontFace {
        match weight {
            Weight::Regular => &self.regular,
            Weight::Bold => &self.bold,
        }
    }

    pub fn text_width(&self, weight: Weight, text: &str, font_size: f32) -> f32 {
        self.face(weight).text_width(text, font_size)
    }
}

/// Font directories searched for a requested family. `FOLIO_FONTS` (path list)
/// comes first, then the platform's usual locations.
fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(val) = std::env::var_os("FOLIO_FONTS") {
        dirs.extend(std::env::split_paths(&val).filter(|p| !p.as_os_str().is_empty()));
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        match std::env::var("WINDIR") {
            Ok(windir) => dirs.push(PathBuf::from(windir).join("Fonts")),
            Err(_) => dirs.push("C:\\Windows\\Fonts".into()),
        }
    }

    dirs
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

fn family_name(face: &Face) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode())
        .find_map(|name| name.to_string())
}

/// Walk the font directories and map the first file whose family and weight
/// match. Italic faces are skipped.
fn find_system_face(family: &str, bold: bool) -> Option<(Mmap, u32)> {
    let mut stack = font_directories();
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_font_file(&path) {
                continue;
            }
            let Ok(file) = std::fs::File::open(&path) else {
                continue;
            };
            // SAFETY: font files are opened read-only and not expected to change
            // while an export runs.
            let Ok(data) = (unsafe { Mmap::map(&file) }) else {
                continue;
            };
            let faces = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
            let found = (0..faces).find(|&index| {
                Face::parse(&data, index).is_ok_and(|face| {
                    !face.is_italic()
                        && face.is_bold() == bold
                        && family_name(&face).is_some_and(|f| f.eq_ignore_ascii_case(family))
                })
            });
            if let Some(index) = found {
                log::debug!("font {family} bold={bold} -> {}", path.display());
                return Some((data, index));
            }
        }
    }
    None
}

/// A face written into a PDF, ready to encode strings for `Tj`.
pub(crate) struct EmbeddedFace {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    char_to_gid: Option<HashMap<char, u16>>,
}

impl EmbeddedFace {
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

impl FontFace {
    pub(crate) fn embed(
        &self,
        pdf: &mut Pdf,
        pdf_name: String,
        alloc: &mut impl FnMut() -> Ref,
        used_chars: &BTreeSet<char>,
    ) -> EmbeddedFace {
        let font_ref = alloc();
        if let FaceSource::TrueType {
            family,
            data,
            index,
            ..
        } = &self.source
        {
            match embed_truetype(pdf, font_ref, family, data, *index, used_chars, alloc) {
                Some(char_to_gid) => {
                    return EmbeddedFace {
                        pdf_name,
                        font_ref,
                        char_to_gid: Some(char_to_gid),
                    };
                }
                None => log::warn!("Embedding {family} failed, using Helvetica"),
            }
        }
        let base_font = match self.weight {
            Weight::Regular => "Helvetica",
            Weight::Bold => "Helvetica-Bold",
        };
        pdf.type1_font(font_ref)
            .base_font(Name(base_font.as_bytes()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        EmbeddedFace {
            pdf_name,
            font_ref,
            char_to_gid: None,
        }
    }
}

/// Embed a subset of a TrueType/OpenType face as a Type0 font with Identity-H
/// encoding. Returns the char → new glyph id map used to encode strings.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    family: &str,
    font_data: &[u8],
    face_index: u32,
    used_chars: &BTreeSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<HashMap<char, u16>> {
    let face = Face::parse(font_data, face_index).ok()?;
    let units = face.units_per_em() as f32;
    let scale = |v: f32| v / units * 1000.0;

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    for &ch in used_chars {
        if let Some(gid) = face.glyph_index(ch) {
            let new_gid = remapper.remap(gid.0);
            char_to_gid.insert(ch, new_gid);
            let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f32;
            gid_widths.push((new_gid, scale(advance)));
        }
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset = subsetter::subset(font_data, face_index, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {family}: {e}, embedding the full font");
        font_data.to_vec()
    });
    let data_len = i32::try_from(subset.len()).ok()?;

    let ps_name: String = family.chars().filter(|c| !c.is_whitespace()).collect();
    let weight_suffix = if face.is_bold() { "-Bold" } else { "" };
    let base_font = format!("{ps_name}{weight_suffix}");

    let data_ref = alloc();
    let descriptor_ref = alloc();
    let cid_font_ref = alloc();
    let to_unicode_ref = alloc();

    pdf.stream(data_ref, &subset)
        .pair(Name(b"Length1"), data_len);

    let bb = face.global_bounding_box();
    pdf.font_descriptor(descriptor_ref)
        .name(Name(base_font.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(Rect::new(
            scale(bb.x_min as f32),
            scale(bb.y_min as f32),
            scale(bb.x_max as f32),
            scale(bb.y_max as f32),
        ))
        .italic_angle(0.0)
        .ascent(scale(face.ascender() as f32))
        .descent(scale(face.descender() as f32))
        .cap_height(face.capital_height().map_or(700.0, |h| scale(h as f32)))
        .stem_v(if face.is_bold() { 120.0 } else { 80.0 })
        .font_file2(data_ref);

    let system_info = || pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(base_font.as_bytes()));
        cid.system_info(system_info());
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut widths = cid.widths();
            for &(gid, width) in &gid_widths {
                widths.consecutive(gid, [width]);
            }
        }
    }

    let cmap_name = format!("{base_font}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(Name(cmap_name.as_bytes()), system_info());
    for (&ch, &gid) in &char_to_gid {
        cmap.pair(gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(to_unicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(base_font.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(to_unicode_ref);

    Some(char_to_gid)
}

/// Map a char to its Windows-1252 byte; `?` when it has none.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007E | 0x00A0..=0x00FF => c as u8,
        0x0009 | 0x000A | 0x000D => b' ',
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => b'?',
    }
}

pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars().map(char_to_winansi).collect()
}

/// Big-endian 2-byte glyph ids for CID-keyed fonts.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    text.chars()
        .flat_map(|ch| char_to_gid.get(&ch).copied().unwrap_or(0).to_be_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_tables_cover_printable_ascii() {
        let fonts = FontSet::standard();
        let regular = fonts.face(Weight::Regular);
        assert_eq!(regular.char_width_1000(' '), 278.0);
        assert_eq!(regular.char_width_1000('W'), 944.0);
        assert_eq!(regular.char_width_1000('~'), 584.0);
        assert_eq!(fonts.face(Weight::Bold).char_width_1000('a'), 556.0);
        assert_eq!(fonts.face(Weight::Bold).char_width_1000('b'), 611.0);
    }

    #[test]
    fn bold_text_is_wider() {
        let fonts = FontSet::standard();
        let text = "The quick brown fox";
        assert!(
            fonts.text_width(Weight::Bold, text, 12.0) > fonts.text_width(Weight::Regular, text, 12.0)
        );
    }

    #[test]
    fn winansi_maps_typographic_chars() {
        assert_eq!(to_winansi_bytes("a•b"), vec![b'a', 0x95, b'b']);
        assert_eq!(to_winansi_bytes("日"), vec![b'?']);
    }

    fn any_installed_font() -> Option<std::path::PathBuf> {
        let mut stack = font_directories();
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if is_font_file(&path) {
                    return Some(path);
                }
            }
        }
        None
    }

    #[test]
    fn truetype_widths_match_the_face() {
        let Some(path) = any_installed_font() else {
            eprintln!("no installed fonts, skipping");
            return;
        };
        let file = std::fs::File::open(&path).expect("open font");
        let data = unsafe { Mmap::map(&file) }.expect("map font");
        let Ok(face) = Face::parse(&data, 0) else {
            return;
        };
        let units = face.units_per_em() as f32;
        let expected: Vec<f32> = "Hello, world"
            .chars()
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map_or(500.0, |adv| adv as f32 / units * 1000.0)
            })
            .collect();
        drop(face);

        let font = FontFace::truetype(Weight::Regular, "Test", data, 0);
        assert!(font.is_embedded());
        for (ch, want) in "Hello, world".chars().zip(&expected) {
            assert!((font.char_width_1000(ch) - want).abs() < 0.001, "{ch:?}");
        }
        let total = font.text_width("Hello, world", 10.0);
        assert!((total - expected.iter().sum::<f32>() / 100.0).abs() < 0.01);
    }

    #[test]
    fn missing_family_falls_back_to_helvetica() {
        let fonts = FontSet::load(Some("No Such Family 9f3a"));
        assert_eq!(fonts.face(Weight::Regular).name(), "Helvetica");
        assert_eq!(fonts.face(Weight::Bold).name(), "Helvetica-Bold");
        assert!(!fonts.face(Weight::Bold).is_embedded());
    }
}
