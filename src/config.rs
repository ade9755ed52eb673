//! Pipeline configuration.
//!
//! One options struct threaded through dispatch and batch runs. Defaults
//! reflect clinical scans: bilingual OCR hint, a modest minimum-yield
//! threshold, a week of cache retention.

use serde::{Deserialize, Serialize};

use crate::pipeline::cost::CostRates;
use crate::pipeline::preprocess::PreprocessOptions;
use crate::pipeline::prompt::DocumentType;

/// Seven days, the cache retention window for remote extraction results.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 7 * 24 * 3600;

/// Per-run extraction options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Category driving the remote instruction template and cache identity.
    pub document_type: DocumentType,
    /// Normalized text shorter than this is flagged as low yield.
    pub min_chars: usize,
    /// Suppresses the convert-to-image suggestion on short PDF text.
    pub prefer_image_ocr: bool,
    /// Tesseract language hint, e.g. "eng+fra".
    pub language_hint: String,
    pub preprocess: PreprocessOptions,
    pub cache_ttl_secs: i64,
    pub rates: CostRates,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            document_type: DocumentType::Generic,
            min_chars: 60,
            prefer_image_ocr: false,
            language_hint: "eng+fra".to_string(),
            preprocess: PreprocessOptions::default(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            rates: CostRates::default(),
        }
    }
}
