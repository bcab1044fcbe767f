//! PDF loading with page-range selection.
//!
//! The page range is resolved against the page count before any text is extracted, so only the
//! selected pages are decoded. Page text is trimmed; pages keep their 0-based source index.

mod range;

pub use range::PageRange;

use lopdf::Document as PdfDocument;
use std::path::Path;
use thiserror::Error;

/// Errors raised while extracting text from a source file.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Source file could not be read.
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
    /// Bytes could not be parsed as a PDF.
    #[error("Failed to parse PDF: {0}")]
    Parse(String),
    /// A selected page failed to decode.
    #[error("Failed to extract text from page {page}: {message}")]
    Page {
        /// 0-based page index.
        page: usize,
        /// Decoder message.
        message: String,
    },
    /// The page range selected no pages.
    #[error("Page range selects no pages (document has {total_pages} pages)")]
    NoPagesSelected {
        /// Page count of the source document.
        total_pages: usize,
    },
    /// Every selected page was empty.
    #[error("Selected pages contain no extractable text")]
    NoText,
}

/// Text of one source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 0-based index of the page in the source file.
    pub index: usize,
    /// Extracted text, trimmed.
    pub text: String,
}

/// Ordered page texts extracted from one source file.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Selected pages in source order.
    pub pages: Vec<Page>,
    /// Page count of the whole source file.
    pub total_pages: usize,
}

impl Document {
    /// Whether any selected page carries text.
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|page| !page.text.is_empty())
    }

    /// Concatenate page texts separated by blank lines, skipping empty pages.
    pub fn joined_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Load a PDF from disk, restricted to `range`.
pub fn load_pdf(path: &Path, range: PageRange) -> Result<Document, ExtractionError> {
    let bytes = std::fs::read(path)?;
    load_pdf_bytes(&bytes, range)
}

/// Load a PDF held in memory, restricted to `range`.
pub fn load_pdf_bytes(bytes: &[u8], range: PageRange) -> Result<Document, ExtractionError> {
    let pdf = PdfDocument::load_mem(bytes).map_err(|err| ExtractionError::Parse(err.to_string()))?;
    let page_numbers: Vec<u32> = pdf.get_pages().into_keys().collect();
    let total_pages = page_numbers.len();
    let selected = range.resolve(total_pages);
    tracing::debug!(
        total_pages,
        start = selected.start,
        end = selected.end,
        "Resolved page range"
    );

    let mut pages = Vec::with_capacity(selected.len());
    for index in selected {
        let text = pdf
            .extract_text(&[page_numbers[index]])
            .map_err(|err| ExtractionError::Page {
                page: index,
                message: err.to_string(),
            })?;
        pages.push(Page {
            index,
            text: text.trim().to_string(),
        });
    }

    Ok(Document { pages, total_pages })
}
