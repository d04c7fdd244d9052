//! PDF text extraction utilities.
//!
//! Extraction runs on the blocking pool; `pdf-extract` is CPU-bound and can panic
//! on malformed input, which surfaces here as an error instead of a crash.

use thiserror::Error;

/// Errors that can occur during PDF extraction
#[derive(Debug, Error)]
pub enum PdfExtractError {
    #[error("Not a PDF document ({0} bytes)")]
    NotAPdf(usize),

    #[error("Failed to extract text from PDF: {0}")]
    ExtractionFailed(String),

    #[error("PDF extraction task aborted: {0}")]
    Aborted(String),
}

/// Whether the buffer starts with the PDF magic bytes
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == b"%PDF"
}

/// Extract text from an in-memory PDF (blocking).
pub fn extract_text(bytes: &[u8]) -> Result<String, PdfExtractError> {
    if !looks_like_pdf(bytes) {
        return Err(PdfExtractError::NotAPdf(bytes.len()));
    }

    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PdfExtractError::ExtractionFailed(e.to_string()))?;

    if text.trim().is_empty() {
        // Usually a scanned, image-only PDF
        tracing::debug!("PDF produced no text ({} bytes)", bytes.len());
    }
    Ok(text)
}

/// Extract text from an in-memory PDF without blocking the async runtime.
pub async fn extract_text_async(bytes: Vec<u8>) -> Result<String, PdfExtractError> {
    tokio::task::spawn_blocking(move || extract_text(&bytes))
        .await
        .map_err(|e| PdfExtractError::Aborted(e.to_string()))?
}
