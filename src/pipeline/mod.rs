//! Document text extraction pipeline.
//!
//! Input bytes are classified by magic numbers, routed to a local engine
//! (PDF text layer or on-device OCR) or, for raster images, optionally to a
//! paid remote vision service with content-addressed caching and cost
//! accounting. The batch orchestrator drives the dispatcher over an ordered
//! file list, one file at a time.

use thiserror::Error;

pub mod batch;
pub mod cache;
pub mod confidence;
pub mod cost;
pub mod dispatch;
pub mod format;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod progress;
pub mod prompt;
pub mod sanitize;
pub mod types;
pub mod vision;

pub use batch::{run_sequential, run_sequential_with_remote, BatchResult, FileExtraction};
pub use cache::{CacheStats, ExtractionCache};
pub use cost::{CostRates, CostSnapshot, CostTracker};
pub use dispatch::{dispatch, dispatch_with_remote};
pub use format::{detect_format, InputFormat};
pub use ocr::{MockOcrEngine, OcrEngine};
pub use preprocess::{preprocess_image, ImagePayload, PreprocessOptions};
pub use progress::{ProgressEvent, ProgressFn, ProgressStage};
pub use prompt::DocumentType;
pub use types::{DocumentInput, ExtractionMethod, ExtractionResult, RemoteExtractionResult};
pub use vision::{
    CancelToken, HttpVisionClient, MockVisionApi, VisionApi, VisionApiError, VisionExtractor,
};

/// Failures the pipeline can surface to callers.
///
/// Most per-file problems never reach this type: engine failures are
/// degraded into empty results with warnings. What remains is contract
/// violations (unsupported input), infrastructure (I/O, storage), and the
/// remote service's classified errors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file format: {0}. Provide a PDF or an image (PNG, JPEG, WEBP).")]
    UnsupportedFormat(String),

    #[error("Could not parse PDF: {0}")]
    PdfParsing(String),

    #[error("Could not initialize the text recognizer: {0}")]
    OcrInit(String),

    #[error("Text recognition failed: {0}")]
    OcrProcessing(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error(transparent)]
    Remote(#[from] vision::VisionApiError),

    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),
}
