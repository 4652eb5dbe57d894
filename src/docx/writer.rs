use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::images::EmbeddedImage;
use super::{Paragraph, TwipMargins};
use crate::error::Error;
use crate::model::Run;

/// A4 in twips.
const PAGE_WIDTH_TWIPS: u32 = 11906;
const PAGE_HEIGHT_TWIPS: u32 = 16838;
const EMU_PER_PX: u64 = 9525;
pub(super) const IMAGE_WIDTH_PX: u64 = 500;
pub(super) const IMAGE_HEIGHT_PX: u64 = 300;

const HEADER_HALF_POINTS: u32 = 18;
const HEADER_COLOR: &str = "808080";

const NS_DECLS: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#,
);

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const NUMBERING_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:abstractNum w:abstractNumId="0">
    <w:multiLevelType w:val="singleLevel"/>
    <w:lvl w:ilvl="0">
      <w:start w:val="1"/>
      <w:numFmt w:val="bullet"/>
      <w:lvlText w:val="•"/>
      <w:lvlJc w:val="left"/>
      <w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr>
    </w:lvl>
  </w:abstractNum>
  <w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
</w:numbering>"#;

pub(super) const BULLET_NUM_ID: u32 = 1;

/// Heading styles with their run size (half-points) and spacing after (twips).
pub(super) const HEADING_STYLES: [(&str, u32, u32); 3] = [
    ("Heading1", 32, 240),
    ("Heading2", 28, 200),
    ("Heading3", 26, 160),
];

const REL_STYLES: &str = "rIdStyles";
const REL_NUMBERING: &str = "rIdNumbering";
const REL_HEADER: &str = "rIdHeader1";

pub(super) struct Package<'a> {
    pub paragraphs: &'a [Paragraph],
    pub media: &'a [EmbeddedImage],
    pub margins: TwipMargins,
    pub header: Option<&'a str>,
}

impl Package<'_> {
    pub fn write(&self) -> Result<Vec<u8>, Error> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(self.content_types().as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS.as_bytes())?;

        zip.start_file("word/_rels/document.xml.rels", options)?;
        zip.write_all(self.document_rels().as_bytes())?;

        zip.start_file("word/document.xml", options)?;
        zip.write_all(self.document().as_bytes())?;

        zip.start_file("word/styles.xml", options)?;
        zip.write_all(styles_xml().as_bytes())?;

        zip.start_file("word/numbering.xml", options)?;
        zip.write_all(NUMBERING_XML.as_bytes())?;

        if let Some(header) = self.header {
            zip.start_file("word/header1.xml", options)?;
            zip.write_all(header_xml(header).as_bytes())?;
        }

        // Already compressed formats gain nothing from deflate.
        for (i, image) in self.media.iter().enumerate() {
            zip.start_file(media_name(i, image), stored)?;
            zip.write_all(&image.bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    fn content_types(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);

        let mut seen: Vec<&str> = Vec::new();
        for image in self.media {
            if !seen.contains(&image.extension) {
                seen.push(image.extension);
                let _ = write!(
                    xml,
                    r#"<Default Extension="{}" ContentType="{}"/>"#,
                    image.extension, image.content_type
                );
            }
        }

        xml.push_str(r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#);
        xml.push_str(r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#);
        xml.push_str(r#"<Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/>"#);
        if self.header.is_some() {
            xml.push_str(r#"<Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>"#);
        }
        xml.push_str("</Types>");
        xml
    }

    fn document_rels(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        let _ = write!(
            xml,
            r#"<Relationship Id="{REL_STYLES}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
        );
        let _ = write!(
            xml,
            r#"<Relationship Id="{REL_NUMBERING}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/>"#
        );
        if self.header.is_some() {
            let _ = write!(
                xml,
                r#"<Relationship Id="{REL_HEADER}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>"#
            );
        }
        for (i, image) in self.media.iter().enumerate() {
            let target = media_name(i, image);
            let _ = write!(
                xml,
                r#"<Relationship Id="{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="{}"/>"#,
                image_rel_id(i),
                target.trim_start_matches("word/"),
            );
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn document(&self) -> String {
        let mut xml = String::from(XML_DECL);
        let _ = write!(xml, "<w:document {NS_DECLS}><w:body>");

        for paragraph in self.paragraphs {
            write_paragraph(&mut xml, paragraph);
        }

        xml.push_str("<w:sectPr>");
        if self.header.is_some() {
            let _ = write!(
                xml,
                r#"<w:headerReference w:type="default" r:id="{REL_HEADER}"/>"#
            );
        }
        let m = self.margins;
        let _ = write!(
            xml,
            r#"<w:pgSz w:w="{PAGE_WIDTH_TWIPS}" w:h="{PAGE_HEIGHT_TWIPS}"/><w:pgMar w:top="{}" w:right="{}" w:bottom="{}" w:left="{}" w:header="720" w:footer="720" w:gutter="0"/>"#,
            m.top, m.right, m.bottom, m.left,
        );
        xml.push_str("</w:sectPr></w:body></w:document>");
        xml
    }
}

fn media_name(index: usize, image: &EmbeddedImage) -> String {
    format!("word/media/image{}.{}", index + 1, image.extension)
}

fn image_rel_id(index: usize) -> String {
    format!("rIdImage{}", index + 1)
}

fn write_paragraph(xml: &mut String, paragraph: &Paragraph) {
    match paragraph {
        Paragraph::Heading { level, runs } => {
            let (style, _, _) = HEADING_STYLES[usize::from((*level).clamp(1, 3)) - 1];
            let _ = write!(xml, r#"<w:p><w:pPr><w:pStyle w:val="{style}"/></w:pPr>"#);
            write_runs(xml, runs);
            xml.push_str("</w:p>");
        }
        Paragraph::Text { runs } => {
            xml.push_str("<w:p>");
            write_runs(xml, runs);
            xml.push_str("</w:p>");
        }
        Paragraph::Bullet { runs } => {
            let _ = write!(
                xml,
                r#"<w:p><w:pPr><w:pStyle w:val="ListParagraph"/><w:numPr><w:ilvl w:val="0"/><w:numId w:val="{BULLET_NUM_ID}"/></w:numPr></w:pPr>"#
            );
            write_runs(xml, runs);
            xml.push_str("</w:p>");
        }
        Paragraph::Empty => xml.push_str("<w:p/>"),
        Paragraph::Image { media, description } => write_image(xml, *media, description),
    }
}

fn write_runs(xml: &mut String, runs: &[Run]) {
    for run in runs {
        if run.is_line_break() {
            xml.push_str("<w:r><w:br/></w:r>");
            continue;
        }
        xml.push_str("<w:r><w:rPr>");
        if run.bold {
            xml.push_str("<w:b/>");
        }
        if run.italic {
            xml.push_str("<w:i/>");
        }
        let size = run.half_points();
        let _ = write!(xml, r#"<w:sz w:val="{size}"/><w:szCs w:val="{size}"/>"#);
        if run.highlight {
            xml.push_str(r#"<w:highlight w:val="yellow"/>"#);
        }
        if run.underline {
            xml.push_str(r#"<w:u w:val="single"/>"#);
        }
        let _ = write!(
            xml,
            r#"</w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
            escape_xml(&run.text)
        );
    }
}

fn write_image(xml: &mut String, media: usize, description: &str) {
    let id = media + 1;
    let cx = IMAGE_WIDTH_PX * EMU_PER_PX;
    let cy = IMAGE_HEIGHT_PX * EMU_PER_PX;
    let descr = escape_xml(description);
    let rel = image_rel_id(media);
    let _ = write!(
        xml,
        concat!(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{id}" name="Picture {id}" descr="{descr}"/>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="{id}" name="Picture {id}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
            r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
        ),
        cx = cx,
        cy = cy,
        id = id,
        descr = descr,
        rel = rel,
    );
}

fn header_xml(text: &str) -> String {
    format!(
        r#"{XML_DECL}<w:hdr {NS_DECLS}><w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:color w:val="{HEADER_COLOR}"/><w:sz w:val="{HEADER_HALF_POINTS}"/><w:szCs w:val="{HEADER_HALF_POINTS}"/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:hdr>"#,
        escape_xml(text)
    )
}

fn styles_xml() -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(
        r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    );
    xml.push_str(concat!(
        r#"<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/>"#,
        r#"<w:sz w:val="24"/><w:szCs w:val="24"/></w:rPr></w:rPrDefault>"#,
        r#"<w:pPrDefault><w:pPr><w:spacing w:after="120"/></w:pPr></w:pPrDefault></w:docDefaults>"#,
        r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#,
    ));
    for (i, (id, size, after)) in HEADING_STYLES.iter().enumerate() {
        let _ = write!(
            xml,
            concat!(
                r#"<w:style w:type="paragraph" w:styleId="{id}"><w:name w:val="heading {level}"/>"#,
                r#"<w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/>"#,
                r#"<w:pPr><w:keepNext/><w:spacing w:before="240" w:after="{after}"/><w:outlineLvl w:val="{outline}"/></w:pPr>"#,
                r#"<w:rPr><w:b/><w:sz w:val="{size}"/><w:szCs w:val="{size}"/></w:rPr></w:style>"#,
            ),
            id = id,
            level = i + 1,
            after = after,
            outline = i,
            size = size,
        );
    }
    xml.push_str(concat!(
        r#"<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/>"#,
        r#"<w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:ind w:left="720"/></w:pPr></w:style>"#,
    ));
    xml.push_str("</w:styles>");
    xml
}

/// Escape text for XML content and attribute values. Characters XML 1.0 cannot
/// carry at all are dropped.
pub(super) fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 || c == '\u{fffe}' || c == '\u{ffff}' => {}
            c => out.push(c),
        }
    }
    out
}
