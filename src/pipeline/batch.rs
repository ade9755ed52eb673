//! Sequential batch orchestration.
//!
//! Files are processed strictly one at a time, in input order, never
//! concurrently. Per-file failures degrade to empty results so one corrupt
//! document never costs the rest of the batch; only unsupported formats and
//! deliberate cancellation abort the whole run.

use tracing::{info, warn};

use super::dispatch::{dispatch, dispatch_with_remote};
use super::format::detect_format;
use super::ocr::OcrEngine;
use super::progress::{emit, ProgressEvent, ProgressFn, ProgressStage};
use super::types::{DocumentInput, ExtractionMethod, ExtractionResult};
use super::vision::{CancelToken, VisionApiError, VisionExtractor};
use super::ExtractionError;
use crate::config::PipelineOptions;

/// Placeholder in the merged text for files that yielded nothing.
pub const NO_TEXT_PLACEHOLDER: &str = "(no text detected)";

/// One file's outcome within a batch.
#[derive(Debug, Clone)]
pub struct FileExtraction {
    pub file_name: String,
    pub result: ExtractionResult,
}

/// Outcome of a whole batch: one result per input file, in input order,
/// plus a single merged text.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub results: Vec<FileExtraction>,
    pub merged_text: String,
}

/// Run local extraction over an ordered list of files.
pub fn run_sequential(
    files: &[DocumentInput],
    engine: &dyn OcrEngine,
    options: &PipelineOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<BatchResult, ExtractionError> {
    run_batch(files, progress, |file, per_file| {
        dispatch(file, engine, options, Some(per_file))
    })
}

/// Run a batch with an optional remote path for raster images.
pub fn run_sequential_with_remote(
    files: &[DocumentInput],
    engine: &dyn OcrEngine,
    options: &PipelineOptions,
    mut remote: Option<&mut VisionExtractor>,
    cancel: Option<&CancelToken>,
    progress: Option<ProgressFn<'_>>,
) -> Result<BatchResult, ExtractionError> {
    run_batch(files, progress, |file, per_file| {
        dispatch_with_remote(
            file,
            engine,
            options,
            remote.as_deref_mut(),
            cancel,
            Some(per_file),
        )
    })
}

fn run_batch(
    files: &[DocumentInput],
    progress: Option<ProgressFn<'_>>,
    mut extract_one: impl FnMut(
        &DocumentInput,
        ProgressFn<'_>,
    ) -> Result<ExtractionResult, ExtractionError>,
) -> Result<BatchResult, ExtractionError> {
    let _span = tracing::info_span!("batch", files = files.len()).entered();
    let total = files.len();
    let mut results = Vec::with_capacity(total);

    for (position, file) in files.iter().enumerate() {
        let index = position + 1;
        let per_file = move |event: ProgressEvent| {
            emit(progress, event.with_file(index, total));
        };

        let result = match extract_one(file, &per_file) {
            Ok(result) => result,
            // Unsupported formats mean validation upstream failed; the whole
            // call is rejected. Cancellation is the user's own abort.
            Err(error @ ExtractionError::UnsupportedFormat(_)) => return Err(error),
            Err(ExtractionError::Remote(VisionApiError::Cancelled)) => {
                return Err(VisionApiError::Cancelled.into());
            }
            Err(error) => {
                warn!(file = %file.file_name, %error, "File failed, continuing batch");
                per_file(
                    ProgressEvent::stage(ProgressStage::Error).with_message(error.to_string()),
                );
                ExtractionResult::empty_with_warning(
                    fallback_method(&file.bytes),
                    error.to_string(),
                )
            }
        };

        results.push(FileExtraction {
            file_name: file.file_name.clone(),
            result,
        });
    }

    let merged_text = merge_text(&results);
    info!(
        files = total,
        degraded = results.iter().filter(|f| f.result.text.is_empty()).count(),
        "Batch complete"
    );
    Ok(BatchResult {
        results,
        merged_text,
    })
}

fn fallback_method(bytes: &[u8]) -> ExtractionMethod {
    if detect_format(bytes).is_pdf() {
        ExtractionMethod::PdfText
    } else {
        ExtractionMethod::ImageOcr
    }
}

/// One line per file, in input order, empty text replaced by a placeholder.
fn merge_text(results: &[FileExtraction]) -> String {
    results
        .iter()
        .map(|file| {
            let text = if file.result.text.is_empty() {
                NO_TEXT_PLACEHOLDER
            } else {
                file.result.text.as_str()
            };
            format!("- {}: {}", file.file_name, text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
