use serde::{Deserialize, Serialize};

/// One file handed to the pipeline: display name plus raw bytes.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl DocumentInput {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// How text was obtained for a file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    PdfText,
    ImageOcr,
    Vision,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfText => "pdf-text",
            Self::ImageOcr => "image-ocr",
            Self::Vision => "vision",
        }
    }
}

/// Extraction metadata, populated where the method can know it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMeta {
    pub page_count: Option<usize>,
    pub language_hint: Option<String>,
    pub elapsed_ms: Option<u64>,
}

/// Result of text extraction for a single document.
/// Produced by exactly one engine per file; immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
    /// Deduplicated, first-seen order. Empty means a clean extraction.
    pub warnings: Vec<String>,
    pub meta: ExtractionMeta,
}

impl ExtractionResult {
    pub fn new(text: String, method: ExtractionMethod) -> Self {
        Self {
            text,
            method,
            warnings: Vec::new(),
            meta: ExtractionMeta::default(),
        }
    }

    /// Degraded result: no text, one warning explaining why.
    pub fn empty_with_warning(method: ExtractionMethod, warning: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            method,
            warnings: vec![warning.into()],
            meta: ExtractionMeta::default(),
        }
    }

    /// Append a warning unless an identical one is already present.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

/// Result of one remote vision extraction, as cached and as returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteExtractionResult {
    pub extracted_text: String,
    pub confidence: f32,
    pub tokens_used: u32,
    /// Money spent on this call; zero when served from cache.
    pub cost: f64,
    pub processing_time_ms: u64,
    pub from_cache: bool,
}
