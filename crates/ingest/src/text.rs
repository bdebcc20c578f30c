use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),
    #[error("Extraction task did not complete: {0}")]
    Task(String),
}

/// Abstraction over a document-to-text backend.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Reads the text layer of a PDF with `pdf-extract`. Pages are joined with a
/// newline; scanned PDFs without a text layer yield an empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractError> {
        if !path.exists() {
            return Err(ExtractError::NotFound(path.display().to_string()));
        }
        // pdf-extract panics on some malformed inputs instead of returning an error.
        let raw = std::panic::catch_unwind(|| pdf_extract::extract_text(path))
            .map_err(|_| ExtractError::Pdf(format!("parser panicked on {}", path.display())))?
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;
        let text = join_pages(&raw);
        if text.is_empty() {
            warn!(path = %path.display(), "PDF has no extractable text");
        }
        Ok(text)
    }
}

/// Splits on form feeds, drops blank pages, and joins the rest with `\n`.
pub fn join_pages(raw: &str) -> String {
    raw.split('\u{000C}')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Mock backend (tests) ──────────────────────────────────────────────────────

/// Returns preset text keyed by file name; unknown names fail.
#[derive(Debug, Clone, Default)]
pub struct MockTextExtractor {
    pub texts: HashMap<String, String>,
}

impl MockTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, text: &str) -> Self {
        self.texts.insert(file_name.to_string(), text.to_string());
        self
    }
}

impl TextExtractor for MockTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.texts
            .get(&name)
            .cloned()
            .ok_or_else(|| ExtractError::Pdf(format!("unreadable: {name}")))
    }
}
