//! Content extraction: uploaded files in, one plain-text string out.
//!
//! PDFs go through `pdf-extract` page by page on the blocking pool. Plain text
//! and Markdown pass through as UTF-8. Page texts and documents are joined in
//! order with no separator.

use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::document::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Magic bytes win over the file name; a `.txt` that is really a PDF is a PDF.
    pub fn detect(document: &Document) -> Option<Self> {
        if document.bytes.starts_with(b"%PDF") {
            return Some(DocumentKind::Pdf);
        }
        let ext = document
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" | "md" | "markdown" => Some(DocumentKind::Text),
            _ => None,
        }
    }
}

/// Extracts and concatenates the text of every document, in upload order.
pub async fn extract_text(documents: &[Document]) -> Result<String, AppError> {
    let mut content = String::new();

    for document in documents {
        let kind = DocumentKind::detect(document).ok_or_else(|| {
            AppError::Extraction(format!(
                "'{}' is not a supported document type (expected PDF, .txt or .md)",
                document.file_name
            ))
        })?;

        let pages = match kind {
            DocumentKind::Pdf => extract_pdf_pages(document).await?,
            DocumentKind::Text => vec![decode_text(document)?],
        };

        debug!(
            "Extracted {} page(s) from '{}'",
            pages.len(),
            document.file_name
        );
        for page in pages {
            content.push_str(&page);
        }
    }

    info!(
        "Extracted {} characters from {} document(s)",
        content.chars().count(),
        documents.len()
    );
    Ok(content)
}

async fn extract_pdf_pages(document: &Document) -> Result<Vec<String>, AppError> {
    let bytes = document.bytes.clone();
    let name = document.file_name.clone();

    // pdf-extract is CPU-bound and may panic on hostile input; a panic surfaces as a JoinError.
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .await
        .map_err(|e| AppError::Extraction(format!("'{name}' could not be parsed: {e}")))?
        .map_err(|e| AppError::Extraction(format!("'{name}' could not be parsed: {e}")))
}

fn decode_text(document: &Document) -> Result<String, AppError> {
    String::from_utf8(document.bytes.to_vec()).map_err(|_| {
        AppError::Extraction(format!("'{}' is not valid UTF-8 text", document.file_name))
    })
}
