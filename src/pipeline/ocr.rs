//! On-device OCR for raster images.
//!
//! `OcrEngine` is the seam: the bundled Tesseract engine sits behind the
//! `ocr` cargo feature (it needs system Tesseract plus traineddata), and
//! `MockOcrEngine` serves tests and non-OCR builds. `extract_image_text`
//! wraps any engine into the pipeline's result and progress contract.

use std::time::Instant;

use tracing::info;

use super::progress::{emit, ProgressEvent, ProgressFn, ProgressStage};
use super::sanitize::normalize_whitespace;
use super::types::{ExtractionMethod, ExtractionResult};
use super::ExtractionError;

/// Warning attached when recognition succeeds but finds no text.
pub const EMPTY_OCR_WARNING: &str =
    "No text recognized in this image; try a sharper, better-lit photo";

/// Raw output of one recognition pass.
#[derive(Debug)]
pub struct OcrOutput {
    pub text: String,
    /// Engine-reported mean confidence, 0.0-1.0.
    pub confidence: f32,
}

/// Recognition engine abstraction.
///
/// `on_fraction` receives the engine's internal progress in 0.0-1.0 when the
/// engine can report it; engines without internal progress may skip calls.
pub trait OcrEngine {
    fn recognize(
        &self,
        image_bytes: &[u8],
        lang: &str,
        on_fraction: Option<&dyn Fn(f32)>,
    ) -> Result<OcrOutput, ExtractionError>;
}

/// Run OCR on a raster image with a fixed language hint.
///
/// Forwards the engine's fractional progress, normalizes whitespace the same
/// way the PDF engine does, and attaches a warning (not a failure) when the
/// recognized text is empty.
pub fn extract_image_text(
    image_bytes: &[u8],
    engine: &dyn OcrEngine,
    language_hint: &str,
    progress: Option<ProgressFn<'_>>,
) -> Result<ExtractionResult, ExtractionError> {
    let start = Instant::now();

    let forward = |fraction: f32| {
        emit(
            progress,
            ProgressEvent::stage(ProgressStage::ExtractingLocal).with_fraction(fraction),
        );
    };
    let output = engine.recognize(image_bytes, language_hint, Some(&forward))?;

    let mut result = ExtractionResult::new(
        normalize_whitespace(&output.text),
        ExtractionMethod::ImageOcr,
    );
    result.meta.language_hint = Some(language_hint.to_string());
    result.meta.elapsed_ms = Some(start.elapsed().as_millis() as u64);
    if result.text.is_empty() {
        result.push_warning(EMPTY_OCR_WARNING);
    }

    info!(
        lang = language_hint,
        text_len = result.text.len(),
        confidence = output.confidence,
        elapsed_ms = result.meta.elapsed_ms,
        "Image OCR complete"
    );
    Ok(result)
}

// ═══════════════════════════════════════════════════════════
// BundledTesseract (feature = "ocr")
// ═══════════════════════════════════════════════════════════

/// Tesseract-backed engine; requires system Tesseract + traineddata.
#[cfg(feature = "ocr")]
pub struct BundledTesseract {
    tessdata_dir: std::path::PathBuf,
}

#[cfg(feature = "ocr")]
impl BundledTesseract {
    pub fn new(tessdata_dir: &std::path::Path) -> Result<Self, ExtractionError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(ExtractionError::OcrInit(format!(
                "No eng.traineddata at {}",
                tessdata_dir.display()
            )));
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for BundledTesseract {
    fn recognize(
        &self,
        image_bytes: &[u8],
        lang: &str,
        on_fraction: Option<&dyn Fn(f32)>,
    ) -> Result<OcrOutput, ExtractionError> {
        let tessdata = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?;

        if let Some(f) = on_fraction {
            f(0.0);
        }

        let mut tess = tesseract::Tesseract::new(Some(tessdata), Some(lang))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;
        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        if let Some(f) = on_fraction {
            f(1.0);
        }

        Ok(OcrOutput { text, confidence })
    }
}

// ═══════════════════════════════════════════════════════════
// MockOcrEngine
// ═══════════════════════════════════════════════════════════

/// Mock engine: returns configured text and replays fixed progress steps.
pub struct MockOcrEngine {
    text: String,
    confidence: f32,
    fail: bool,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            fail: false,
        }
    }

    /// Engine that fails every recognition pass.
    pub fn failing() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            fail: true,
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(
        &self,
        _image_bytes: &[u8],
        _lang: &str,
        on_fraction: Option<&dyn Fn(f32)>,
    ) -> Result<OcrOutput, ExtractionError> {
        if self.fail {
            return Err(ExtractionError::OcrProcessing("mock engine failure".into()));
        }
        if let Some(f) = on_fraction {
            for step in [0.25, 0.5, 0.75, 1.0] {
                f(step);
            }
        }
        Ok(OcrOutput {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn recognized_text_is_normalized() {
        let engine = MockOcrEngine::new("Dose:   500mg   daily", 0.9);
        let result = extract_image_text(b"img", &engine, "eng+fra", None).unwrap();

        assert_eq!(result.text, "Dose: 500mg daily");
        assert_eq!(result.method, ExtractionMethod::ImageOcr);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn language_hint_recorded_in_meta() {
        let engine = MockOcrEngine::new("text", 0.8);
        let result = extract_image_text(b"img", &engine, "eng+fra", None).unwrap();
        assert_eq!(result.meta.language_hint.as_deref(), Some("eng+fra"));
    }

    #[test]
    fn empty_recognition_warns_instead_of_failing() {
        let engine = MockOcrEngine::new("", 0.0);
        let result = extract_image_text(b"img", &engine, "eng+fra", None).unwrap();
        assert!(result.text.is_empty());
        assert_eq!(result.warnings, vec![EMPTY_OCR_WARNING]);
    }

    #[test]
    fn engine_progress_is_forwarded() {
        let engine = MockOcrEngine::new("some text", 0.9);
        let fractions = RefCell::new(Vec::new());
        let callback = |event: ProgressEvent| {
            assert_eq!(event.stage, ProgressStage::ExtractingLocal);
            fractions.borrow_mut().push(event.fraction_complete.unwrap());
        };

        extract_image_text(b"img", &engine, "eng", Some(&callback)).unwrap();
        assert_eq!(*fractions.borrow(), vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn engine_failure_propagates() {
        let engine = MockOcrEngine::failing();
        let result = extract_image_text(b"img", &engine, "eng", None);
        assert!(matches!(result, Err(ExtractionError::OcrProcessing(_))));
    }
}
