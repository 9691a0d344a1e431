//! Text extraction: turns a PDF into one linear text blob, page by page.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use bytes::Bytes;
use lopdf::Document as PdfDocument;
use thiserror::Error;
use tracing::{debug, warn};

/// Where a document's bytes come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    /// Uploaded content, shared without copying.
    Bytes(Bytes),
}

/// A résumé selected for analysis. The identifier is what the caller shows
/// to the user (usually the file name).
#[derive(Debug, Clone)]
pub struct Document {
    pub identifier: String,
    pub source: DocumentSource,
}

impl Document {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identifier = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            identifier,
            source: DocumentSource::Path(path),
        }
    }

    pub fn from_bytes(identifier: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            identifier: identifier.into(),
            source: DocumentSource::Bytes(bytes.into()),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to extract text from '{document}': {cause}")]
pub struct ExtractionError {
    pub document: String,
    pub cause: String,
}

impl ExtractionError {
    fn new(document: &str, cause: impl ToString) -> Self {
        Self {
            document: document.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Extracts the text of every page in physical order, each page followed by a
/// newline. Pages with no text contribute nothing. A document with no text at
/// all (scanned images) yields an empty string, not an error.
pub fn extract_text(document: &Document) -> Result<String, ExtractionError> {
    match &document.source {
        DocumentSource::Path(path) => {
            // Read fully so the handle is released before parsing starts.
            let bytes = std::fs::read(path)
                .map_err(|e| ExtractionError::new(&document.identifier, e))?;
            extract_text_from_mem(&document.identifier, &bytes)
        }
        DocumentSource::Bytes(bytes) => extract_text_from_mem(&document.identifier, bytes),
    }
}

pub fn extract_text_from_mem(identifier: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
    match PdfDocument::load_mem(bytes) {
        Ok(pdf) => Ok(extract_pages(identifier, &pdf)),
        Err(lopdf_err) => {
            debug!("lopdf could not parse {identifier} ({lopdf_err}), trying pdf-extract");
            extract_with_pdf_extract(identifier, bytes)
                .map_err(|cause| ExtractionError::new(identifier, format!("{lopdf_err}; {cause}")))
        }
    }
}

fn extract_pages(identifier: &str, pdf: &PdfDocument) -> String {
    let mut text = String::new();
    for page_number in pdf.get_pages().keys() {
        match pdf.extract_text(&[*page_number]) {
            Ok(page_text) => {
                let page_text = page_text.trim_end();
                if !page_text.trim().is_empty() {
                    text.push_str(page_text);
                    text.push('\n');
                }
            }
            Err(e) => warn!("{identifier}: page {page_number} has no extractable text: {e}"),
        }
    }
    text
}

/// pdf-extract panics on some malformed inputs; contain that here.
fn extract_with_pdf_extract(identifier: &str, bytes: &[u8]) -> Result<String, String> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));
    match outcome {
        Ok(Ok(raw)) => Ok(join_pages(raw.split('\u{c}'))),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => {
            warn!("pdf-extract panicked while reading {identifier}");
            Err("PDF parser aborted on malformed input".to_string())
        }
    }
}

fn join_pages<'a>(pages: impl Iterator<Item = &'a str>) -> String {
    let mut text = String::new();
    for page in pages {
        let page = page.trim_end();
        if !page.trim().is_empty() {
            text.push_str(page);
            text.push('\n');
        }
    }
    text
}
