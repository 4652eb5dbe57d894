use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::blocks::parse_blocks;
use crate::config::DocumentSettings;
use crate::docx::{self, ImageFetcher, WordOptions};
use crate::error::Error;
use crate::pdf::{self, PdfOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Docx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }
}

/// Give `name` the extension of `format`.
///
/// An existing `.pdf` or `.docx` extension (any case) is replaced; anything
/// else is kept and the extension appended. Blank names become `document`.
pub fn normalize_filename(name: &str, format: ExportFormat) -> String {
    let ext = format.extension();
    let name = name.trim();
    let stem = [".pdf", ".docx"]
        .iter()
        .find_map(|known| {
            let split = name.len().checked_sub(known.len())?;
            let tail = name.get(split..)?;
            tail.eq_ignore_ascii_case(known).then(|| &name[..split])
        })
        .unwrap_or(name)
        .trim();
    if stem.is_empty() {
        format!("document.{ext}")
    } else {
        format!("{stem}.{ext}")
    }
}

/// Write `bytes` to `dir/name` through a temporary sibling file, so a failed
/// write never leaves a partial document behind.
pub fn save(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, Error> {
    let target = dir.join(name);
    let tmp = dir.join(format!(".{name}.part"));

    let written = std::fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| std::fs::rename(&tmp, &target)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    log::info!("saved {} ({} bytes)", target.display(), bytes.len());
    Ok(target)
}

/// Runs exports and rejects a second export of a document that is still being
/// exported.
#[derive(Debug, Default)]
pub struct Exporter {
    in_flight: Mutex<HashSet<String>>,
}

struct FlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_exporting(&self, doc_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(doc_id)
    }

    fn begin(&self, doc_id: &str) -> Result<FlightGuard<'_>, Error> {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !set.insert(doc_id.to_string()) {
            log::warn!("export of {doc_id} rejected: already running");
            return Err(Error::ExportInProgress(doc_id.to_string()));
        }
        Ok(FlightGuard {
            set: &self.in_flight,
            id: doc_id.to_string(),
        })
    }

    /// Run `job` while holding the guard for `doc_id`.
    pub fn run<T>(&self, doc_id: &str, job: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
        let _guard = self.begin(doc_id)?;
        job()
    }

    /// Parse, render and save a PDF. Nothing is written when rendering fails.
    pub fn export_pdf(
        &self,
        doc_id: &str,
        html: &str,
        settings: &DocumentSettings,
        dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, Error> {
        self.run(doc_id, || {
            let blocks = parse_blocks(html);
            let bytes = pdf::render(&blocks, &PdfOptions::from_settings(settings))?;
            save(dir, &normalize_filename(filename, ExportFormat::Pdf), &bytes)
        })
    }

    pub fn export_docx(
        &self,
        doc_id: &str,
        html: &str,
        settings: &DocumentSettings,
        fetcher: &dyn ImageFetcher,
        dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, Error> {
        self.run(doc_id, || {
            let bytes = docx::render(html, &WordOptions::from_settings(settings), fetcher)?;
            save(dir, &normalize_filename(filename, ExportFormat::Docx), &bytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_swapped_or_appended() {
        assert_eq!(normalize_filename("report", ExportFormat::Pdf), "report.pdf");
        assert_eq!(normalize_filename("report.PDF", ExportFormat::Pdf), "report.pdf");
        assert_eq!(normalize_filename("report.docx", ExportFormat::Pdf), "report.pdf");
        assert_eq!(normalize_filename("notes.v2", ExportFormat::Docx), "notes.v2.docx");
        assert_eq!(normalize_filename("  ", ExportFormat::Docx), "document.docx");
        assert_eq!(normalize_filename(".pdf", ExportFormat::Pdf), "document.pdf");
    }

    #[test]
    fn guard_is_released_after_failure() {
        let exporter = Exporter::new();
        let failed: Result<(), Error> = exporter.run("doc", || Err(Error::EmptyDocument));
        assert!(failed.is_err());
        assert!(!exporter.is_exporting("doc"));
    }
}
