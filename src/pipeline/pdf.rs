//! PDF text-layer reader — no OCR, walks pages in order.
//!
//! This is the cheapest extraction method: a digital PDF carries its text
//! already, so reading the layer costs nothing. Scanned PDFs have no layer
//! and come back empty; that is a warning, not a failure, and the dispatcher
//! tells the user to convert to an image instead.

use std::time::Instant;

use tracing::info;

use super::progress::{emit, ProgressEvent, ProgressFn, ProgressStage};
use super::sanitize::normalize_whitespace;
use super::types::{ExtractionMethod, ExtractionResult};
use super::ExtractionError;

/// Warning attached when a PDF opens fine but yields no text.
pub const EMPTY_PDF_WARNING: &str =
    "No text layer found in this PDF; convert it to an image for better results";

/// Extract the text layer from a PDF, page by page.
///
/// Pages are concatenated with a blank-line separator and the whole text is
/// whitespace-normalized. One progress event is reported per page with
/// `fraction_complete = page_index / page_count`. Fails only if the document
/// cannot be opened at all.
pub fn extract_pdf_text(
    pdf_bytes: &[u8],
    progress: Option<ProgressFn<'_>>,
) -> Result<ExtractionResult, ExtractionError> {
    let start = Instant::now();

    let pages = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;
    let page_count = pages.len();

    let mut parts = Vec::with_capacity(page_count);
    for (index, page_text) in pages.into_iter().enumerate() {
        emit(
            progress,
            ProgressEvent::stage(ProgressStage::ExtractingLocal)
                .with_message(format!("page {}/{page_count}", index + 1))
                .with_fraction(index as f32 / page_count.max(1) as f32),
        );
        parts.push(page_text);
    }

    let text = normalize_whitespace(&parts.join("\n\n"));

    let mut result = ExtractionResult::new(text, ExtractionMethod::PdfText);
    result.meta.page_count = Some(page_count);
    result.meta.elapsed_ms = Some(start.elapsed().as_millis() as u64);
    if result.text.is_empty() {
        result.push_warning(EMPTY_PDF_WARNING);
    }

    info!(
        page_count,
        text_len = result.text.len(),
        elapsed_ms = result.meta.elapsed_ms,
        "PDF text-layer extraction complete"
    );
    Ok(result)
}
