// src/pdf_text.rs

use async_trait::async_trait;
use lopdf::Document;
use tracing::info;

use crate::error::{Result, ScanError};
use crate::text_source::{TextContent, TextSource};

/// Minimum number of non-whitespace characters expected from a "real"
/// text PDF. Below this threshold the document is treated as scanned.
const MIN_TEXT_CHARS: usize = 30;

/// Text source for born-digital PDFs with an embedded text layer.
///
/// Scanned/image-only PDFs are refused with a pointer to the OCR-backed
/// sources; this source never silently returns near-empty text for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfText;

#[async_trait]
impl TextSource for PdfText {
    async fn load(&self, bytes: &[u8]) -> Result<TextContent> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| ScanError::OcrServiceFailed(format!("failed to parse PDF: {e}")))?;

        if looks_like_scanned(&doc) {
            return Err(ScanError::OcrServiceFailed(
                "PDF is scanned/image-only; use an OCR-backed text source".to_string(),
            ));
        }

        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ScanError::OcrServiceFailed(format!("failed to extract text: {e}")))?;

        let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
        if meaningful < MIN_TEXT_CHARS {
            return Err(ScanError::OcrServiceFailed(format!(
                "PDF text layer too short ({meaningful} chars); likely scanned"
            )));
        }

        info!(chars = text.len(), "Extracted PDF text layer");
        Ok(TextContent::new(text))
    }
}

/// Inspect the PDF object tree for pages that carry XObject images but no
/// Font resources; such pages are almost certainly scans. If at least 80%
/// of pages look that way, the whole document is treated as scanned.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false; // Can't tell; let text extraction try.
    }

    let image_only = pages
        .values()
        .filter(|object_id| {
            let Some(page_dict) = doc
                .get_object(**object_id)
                .ok()
                .and_then(|obj| obj.as_dict().ok())
            else {
                return false;
            };
            let has_fonts = resource_entry_present(doc, page_dict, b"Font");
            let has_images = resource_entry_present(doc, page_dict, b"XObject");
            has_images && !has_fonts
        })
        .count();

    image_only as f64 / pages.len() as f64 >= 0.8
}

/// Whether the page's `Resources` dictionary has a non-empty entry under
/// `key`, following indirect references.
fn resource_entry_present(doc: &Document, page_dict: &lopdf::Dictionary, key: &[u8]) -> bool {
    page_dict
        .get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|resources| resources.get(key).ok())
        .and_then(|entry| doc.dereference(entry).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|dict| !dict.is_empty())
}
