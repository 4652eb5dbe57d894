use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "Cannot export an empty document. Wait for pending AI edits to finish or add some content first."
    )]
    EmptyDocument,

    #[error("PDF Generation Failed: {0}")]
    PdfGeneration(String),

    #[error("DOCX Generation Failed: {0}")]
    DocxGeneration(String),

    #[error("could not fetch image {src}: {reason}")]
    ImageFetch { src: String, reason: String },

    #[error("an export of document {0} is already running")]
    ExportInProgress(String),

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub(crate) fn image_fetch(src: &str, reason: impl ToString) -> Self {
        Error::ImageFetch {
            src: truncate_src(src),
            reason: reason.to_string(),
        }
    }
}

// Data URIs can be megabytes long; keep log lines readable.
fn truncate_src(src: &str) -> String {
    const MAX: usize = 64;
    match src.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &src[..idx]),
        None => src.to_string(),
    }
}
