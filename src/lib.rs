pub mod blocks;
pub mod config;
pub mod docx;
mod error;
pub mod export;
pub mod fonts;
pub mod html;
pub mod inline;
pub mod model;
pub mod paginate;
pub mod pdf;

pub use blocks::{UnknownTagPolicy, parse_blocks, parse_blocks_with};
pub use config::{DocumentSettings, Margins, PageNumberPosition};
pub use docx::{DefaultFetcher, ImageFetcher, WordOptions};
pub use error::Error;
pub use export::{ExportFormat, Exporter, normalize_filename, save};
pub use model::{Block, ListItem, Run};
pub use paginate::{DecorationSet, Paginator, PaginationConfig, compute_decorations};
pub use pdf::PdfOptions;

use std::path::Path;
use std::time::Instant;

/// Parse editor HTML and render it as a PDF.
pub fn html_to_pdf(html: &str, settings: &DocumentSettings) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();

    let blocks = parse_blocks(html);
    let t_parse = t0.elapsed();

    let bytes = pdf::render(&blocks, &PdfOptions::from_settings(settings))?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, render={:.1}ms, total={:.1}ms (output {} bytes)",
        t_parse.as_secs_f64() * 1000.0,
        (t_total - t_parse).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );

    Ok(bytes)
}

/// Render editor HTML as a Word document. Relative image paths resolve
/// against `base_dir` when given.
pub fn html_to_docx(
    html: &str,
    settings: &DocumentSettings,
    base_dir: Option<&Path>,
) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();

    let fetcher = DefaultFetcher {
        base_dir: base_dir.map(Path::to_path_buf),
        ..DefaultFetcher::default()
    };
    let bytes = docx::render(html, &WordOptions::from_settings(settings), &fetcher)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: total={:.1}ms (output {} bytes)",
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );

    Ok(bytes)
}
