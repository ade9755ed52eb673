//! Per-file method selection.
//!
//! `dispatch` picks the extraction engine from the detected format: PDFs go
//! through the text-layer reader, raster images through OCR. A PDF whose
//! reader fails, or whose text layer is nearly empty, yields a degraded
//! result carrying a convert-to-image suggestion — the PDF is never
//! rasterized here. `dispatch_with_remote` adds an optional paid path for
//! raster formats the remote service accepts.

use tracing::warn;

use super::format::detect_format;
use super::ocr::{extract_image_text, OcrEngine};
use super::pdf::extract_pdf_text;
use super::preprocess::preprocess_image;
use super::progress::{emit, ProgressEvent, ProgressFn, ProgressStage};
use super::sanitize::normalize_whitespace;
use super::types::{DocumentInput, ExtractionMethod, ExtractionResult};
use super::vision::{CancelToken, VisionExtractor};
use super::ExtractionError;
use crate::config::PipelineOptions;

/// Attached when the PDF reader cannot open the document at all.
pub const PDF_UNREADABLE_WARNING: &str =
    "Could not read this PDF. Convert it to an image (photo or screenshot) and try again.";

/// Attached when a PDF's text layer came back below the yield threshold.
pub const LOW_PDF_YIELD_WARNING: &str =
    "The PDF text layer is very short; convert to image to improve text yield.";

/// Attached when OCR output came back below the yield threshold.
pub const LOW_OCR_YIELD_WARNING: &str =
    "Recognized text is very short and may be low quality.";

/// Extract text from one file using local engines only.
///
/// Fails only on unsupported formats. Engine failures degrade to an empty
/// result with a warning so a batch containing one corrupt file still
/// produces a result per file.
pub fn dispatch(
    input: &DocumentInput,
    engine: &dyn OcrEngine,
    options: &PipelineOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<ExtractionResult, ExtractionError> {
    emit(
        progress,
        ProgressEvent::stage(ProgressStage::Validating).with_message(&input.file_name),
    );

    let format = detect_format(&input.bytes);
    if !format.is_supported() {
        return Err(ExtractionError::UnsupportedFormat(input.file_name.clone()));
    }

    let mut result = if format.is_pdf() {
        extract_pdf(input, options, progress)
    } else {
        extract_raster(input, engine, options, progress)
    };

    // Whitespace is normalized on every path, even degraded ones.
    result.text = normalize_whitespace(&result.text);

    emit(progress, ProgressEvent::stage(ProgressStage::Complete));
    Ok(result)
}

fn extract_pdf(
    input: &DocumentInput,
    options: &PipelineOptions,
    progress: Option<ProgressFn<'_>>,
) -> ExtractionResult {
    let mut result = match extract_pdf_text(&input.bytes, progress) {
        Ok(result) => result,
        Err(error) => {
            warn!(file = %input.file_name, %error, "PDF text extraction failed, degrading");
            return ExtractionResult::empty_with_warning(
                ExtractionMethod::PdfText,
                PDF_UNREADABLE_WARNING,
            );
        }
    };

    // Short text layer: warn only. The PDF is not rasterized and re-run
    // through OCR; whether it should be is an open product decision, so the
    // observed warning-only behavior stands.
    if !options.prefer_image_ocr && result.text.chars().count() < options.min_chars {
        result.push_warning(LOW_PDF_YIELD_WARNING);
    }
    result
}

fn extract_raster(
    input: &DocumentInput,
    engine: &dyn OcrEngine,
    options: &PipelineOptions,
    progress: Option<ProgressFn<'_>>,
) -> ExtractionResult {
    let mut result = match extract_image_text(&input.bytes, engine, &options.language_hint, progress)
    {
        Ok(result) => result,
        Err(error) => {
            warn!(file = %input.file_name, %error, "OCR failed, degrading");
            return ExtractionResult::empty_with_warning(
                ExtractionMethod::ImageOcr,
                format!("Text recognition failed: {error}"),
            );
        }
    };

    if !result.text.is_empty() && result.text.chars().count() < options.min_chars {
        result.push_warning(LOW_OCR_YIELD_WARNING);
    }
    result
}

/// Like [`dispatch`], routing remote-safe raster images through the paid
/// vision service instead of local OCR. PDFs always stay local; so do
/// raster formats the remote service does not accept (BMP, TIFF).
pub fn dispatch_with_remote(
    input: &DocumentInput,
    engine: &dyn OcrEngine,
    options: &PipelineOptions,
    remote: Option<&mut VisionExtractor>,
    cancel: Option<&CancelToken>,
    progress: Option<ProgressFn<'_>>,
) -> Result<ExtractionResult, ExtractionError> {
    let format = detect_format(&input.bytes);
    let Some(extractor) = remote.filter(|_| format.remote_safe()) else {
        return dispatch(input, engine, options, progress);
    };

    emit(
        progress,
        ProgressEvent::stage(ProgressStage::Validating).with_message(&input.file_name),
    );
    emit(progress, ProgressEvent::stage(ProgressStage::Preprocessing));
    let payload = preprocess_image(&input.bytes, &options.preprocess)?;

    emit(progress, ProgressEvent::stage(ProgressStage::ExtractingRemote));
    let remote_result = extractor.extract_remote(&payload, options.document_type, cancel)?;

    emit(progress, ProgressEvent::stage(ProgressStage::Parsing));
    let mut result = ExtractionResult::new(
        normalize_whitespace(&remote_result.extracted_text),
        ExtractionMethod::Vision,
    );
    result.meta.elapsed_ms = Some(remote_result.processing_time_ms);
    if result.text.is_empty() {
        result.push_warning("No text was detected in the image.");
    }

    emit(progress, ProgressEvent::stage(ProgressStage::Complete));
    Ok(result)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cache::ExtractionCache;
    use crate::pipeline::cost::{CostRates, CostTracker};
    use crate::pipeline::ocr::MockOcrEngine;
    use crate::pipeline::pdf::test_pdf::make_pdf;
    use crate::pipeline::vision::MockVisionApi;
    use crate::storage::MemoryStore;
    use std::cell::RefCell;

    fn input(name: &str, bytes: Vec<u8>) -> DocumentInput {
        DocumentInput::new(name, bytes)
    }

    /// Magic bytes make this a recognized JPEG; the mock engine never
    /// decodes the rest.
    fn fake_jpeg() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(b"not really pixels");
        bytes
    }

    fn real_png() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(96, 96, |x, y| {
            image::Rgb([(x * 3) as u8, (y * 2) as u8, ((x + y) % 251) as u8])
        }));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        bytes
    }

    // ── Format rejection ──

    #[test]
    fn unsupported_format_is_rejected() {
        let engine = MockOcrEngine::new("text", 80.0);
        let result = dispatch(
            &input("notes.txt", b"plain text, no magic".to_vec()),
            &engine,
            &PipelineOptions::default(),
            None,
        );
        assert!(matches!(
            result,
            Err(ExtractionError::UnsupportedFormat(name)) if name == "notes.txt"
        ));
    }

    // ── PDF path ──

    #[test]
    fn readable_pdf_with_ample_text_has_no_warnings() {
        let long_line = "Patient presented with stable vitals and no acute distress. ".repeat(5);
        let pdf = make_pdf(&[&long_line, &long_line]);
        let engine = MockOcrEngine::new("", 0.0);
        let options = PipelineOptions {
            min_chars: 80,
            ..Default::default()
        };

        let result = dispatch(&input("visit.pdf", pdf), &engine, &options, None).unwrap();

        assert_eq!(result.method, ExtractionMethod::PdfText);
        assert!(result.text.chars().count() > 400);
        assert!(result.warnings.is_empty(), "got: {:?}", result.warnings);
        assert_eq!(result.meta.page_count, Some(2));
    }

    #[test]
    fn corrupt_pdf_degrades_with_convert_warning() {
        let mut bytes = b"%PDF-1.4 garbage".to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let engine = MockOcrEngine::new("", 0.0);

        let result = dispatch(
            &input("broken.pdf", bytes),
            &engine,
            &PipelineOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(result.text, "");
        assert_eq!(result.warnings, vec![PDF_UNREADABLE_WARNING]);
    }

    #[test]
    fn short_pdf_text_gets_yield_warning_but_is_kept() {
        let pdf = make_pdf(&["Short note."]);
        let engine = MockOcrEngine::new("", 0.0);
        let options = PipelineOptions {
            min_chars: 80,
            ..Default::default()
        };

        let result = dispatch(&input("stub.pdf", pdf), &engine, &options, None).unwrap();

        assert_eq!(result.text, "Short note.");
        assert_eq!(result.warnings, vec![LOW_PDF_YIELD_WARNING]);
    }

    #[test]
    fn prefer_image_ocr_suppresses_yield_warning() {
        let pdf = make_pdf(&["Short note."]);
        let engine = MockOcrEngine::new("", 0.0);
        let options = PipelineOptions {
            min_chars: 80,
            prefer_image_ocr: true,
            ..Default::default()
        };

        let result = dispatch(&input("stub.pdf", pdf), &engine, &options, None).unwrap();
        assert!(result.warnings.is_empty());
    }

    // ── Raster path ──

    #[test]
    fn short_ocr_text_warns_about_quality() {
        let engine = MockOcrEngine::new("Rx 20mg daily", 55.0);
        let options = PipelineOptions {
            min_chars: 80,
            ..Default::default()
        };

        let result = dispatch(&input("photo.jpg", fake_jpeg()), &engine, &options, None).unwrap();

        assert_eq!(result.method, ExtractionMethod::ImageOcr);
        assert_eq!(result.text, "Rx 20mg daily");
        assert_eq!(result.warnings, vec![LOW_OCR_YIELD_WARNING]);
    }

    #[test]
    fn ocr_failure_degrades_instead_of_propagating() {
        let engine = MockOcrEngine::failing();
        let result = dispatch(
            &input("photo.jpg", fake_jpeg()),
            &engine,
            &PipelineOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(result.text, "");
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn empty_ocr_does_not_double_warn_about_yield() {
        let engine = MockOcrEngine::new("", 0.0);
        let result = dispatch(
            &input("photo.jpg", fake_jpeg()),
            &engine,
            &PipelineOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(result.warnings.len(), 1, "got: {:?}", result.warnings);
        assert!(!result.warnings.contains(&LOW_OCR_YIELD_WARNING.to_string()));
    }

    // ── Progress ──

    #[test]
    fn dispatch_brackets_with_validating_and_complete() {
        let stages = RefCell::new(Vec::new());
        let capture = |event: ProgressEvent| stages.borrow_mut().push(event.stage);

        let engine = MockOcrEngine::new("some recognized text that is long enough", 80.0);
        dispatch(
            &input("photo.jpg", fake_jpeg()),
            &engine,
            &PipelineOptions {
                min_chars: 10,
                ..Default::default()
            },
            Some(&capture),
        )
        .unwrap();

        let stages = stages.borrow();
        assert_eq!(stages.first(), Some(&ProgressStage::Validating));
        assert_eq!(stages.last(), Some(&ProgressStage::Complete));
        assert!(stages.contains(&ProgressStage::ExtractingLocal));
    }

    // ── Remote routing ──

    fn remote_extractor(text: &str) -> VisionExtractor {
        VisionExtractor::new(
            Box::new(MockVisionApi::new(text)),
            ExtractionCache::new(Box::new(MemoryStore::new())),
            CostTracker::new(Box::new(MemoryStore::new())),
            CostRates::default(),
            3600,
        )
    }

    #[test]
    fn remote_path_takes_raster_images() {
        let engine = MockOcrEngine::new("local text, should not be used", 80.0);
        let mut extractor = remote_extractor("Remote transcription of the scan");

        let result = dispatch_with_remote(
            &input("scan.png", real_png()),
            &engine,
            &PipelineOptions::default(),
            Some(&mut extractor),
            None,
            None,
        )
        .unwrap();

        assert_eq!(result.method, ExtractionMethod::Vision);
        assert_eq!(result.text, "Remote transcription of the scan");
    }

    #[test]
    fn remote_path_leaves_pdfs_local() {
        let pdf = make_pdf(&["A text layer the local reader handles on its own."]);
        let engine = MockOcrEngine::new("", 0.0);
        let mut extractor = remote_extractor("should not be called");

        let result = dispatch_with_remote(
            &input("doc.pdf", pdf),
            &engine,
            &PipelineOptions {
                min_chars: 10,
                ..Default::default()
            },
            Some(&mut extractor),
            None,
            None,
        )
        .unwrap();

        assert_eq!(result.method, ExtractionMethod::PdfText);
    }

    #[test]
    fn remote_path_without_extractor_falls_back_to_local() {
        let engine = MockOcrEngine::new("local ocr output with plenty of characters", 80.0);
        let result = dispatch_with_remote(
            &input("photo.jpg", fake_jpeg()),
            &engine,
            &PipelineOptions {
                min_chars: 10,
                ..Default::default()
            },
            None,
            None,
            None,
        )
        .unwrap();

        assert_eq!(result.method, ExtractionMethod::ImageOcr);
    }

    #[test]
    fn remote_path_emits_remote_stage() {
        let stages = RefCell::new(Vec::new());
        let capture = |event: ProgressEvent| stages.borrow_mut().push(event.stage);

        let engine = MockOcrEngine::new("", 0.0);
        let mut extractor = remote_extractor("text");
        dispatch_with_remote(
            &input("scan.png", real_png()),
            &engine,
            &PipelineOptions::default(),
            Some(&mut extractor),
            None,
            Some(&capture),
        )
        .unwrap();

        let stages = stages.borrow();
        assert!(stages.contains(&ProgressStage::Preprocessing));
        assert!(stages.contains(&ProgressStage::ExtractingRemote));
        assert_eq!(stages.last(), Some(&ProgressStage::Complete));
    }
}
