//! Remote vision extraction — the paid path.
//!
//! Builds a document-type-specific instruction, invokes the remote vision
//! service, prices the reported token usage, and classifies failures by HTTP
//! status. The cache is consulted before any network call and filled after a
//! successful one; failed calls never write cache entries. Every successful
//! call's cost is recorded in the `CostTracker`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::cache::{CacheKey, CacheStats, ExtractionCache};
use super::confidence::estimate_confidence;
use super::cost::{CostRates, CostSnapshot, CostTracker};
use super::preprocess::ImagePayload;
use super::prompt::{instruction_for, DocumentType};
use super::types::RemoteExtractionResult;
use super::ExtractionError;
use crate::storage::StorageError;

// ═══════════════════════════════════════════════════════════
// Errors and cancellation
// ═══════════════════════════════════════════════════════════

/// Remote-service failures, classified from the HTTP status so callers can
/// show distinct messages. Nothing here is retried by the pipeline.
#[derive(Error, Debug)]
pub enum VisionApiError {
    #[error("Extraction service rejected the credentials (HTTP 401): {0}")]
    AuthFailure(String),

    #[error("Extraction endpoint not found (HTTP 404): {0}")]
    NotFound(String),

    #[error("Extraction service is rate limited (HTTP 429), wait before retrying: {0}")]
    RateLimited(String),

    #[error("Extraction service error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("Could not parse extraction response: {0}")]
    ResponseParsing(String),

    #[error("Extraction was cancelled")]
    Cancelled,
}

/// Cooperative cancellation for one in-flight remote call.
///
/// Local extraction never checks this token — only the remote path does,
/// before dispatching the request and when classifying its outcome, so a
/// cancelled call reports `Cancelled` rather than an HTTP-derived error.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════
// Wire contract
// ═══════════════════════════════════════════════════════════

/// Request to the remote vision service.
#[derive(Debug, Clone, Serialize)]
pub struct VisionRequest {
    pub image_base64: String,
    pub mime_type: String,
    pub instruction: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisionUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Normalized response: concatenated content plus token usage.
#[derive(Debug, Clone)]
pub struct VisionResponse {
    pub content: String,
    pub usage: VisionUsage,
}

/// Remote service abstraction (allows mocking for tests).
///
/// Implementations observe `cancel` at their own suspension points; a
/// triggered token makes the call fail with [`VisionApiError::Cancelled`].
pub trait VisionApi {
    fn extract(
        &self,
        request: &VisionRequest,
        cancel: Option<&CancelToken>,
    ) -> Result<VisionResponse, VisionApiError>;
}

// ═══════════════════════════════════════════════════════════
// HttpVisionClient
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct WireContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct WireResponse {
    content_blocks: Vec<WireContentBlock>,
    usage: VisionUsage,
}

/// Production client over HTTP.
pub struct HttpVisionClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl HttpVisionClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, VisionApiError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| VisionApiError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }
}

impl VisionApi for HttpVisionClient {
    fn extract(
        &self,
        request: &VisionRequest,
        cancel: Option<&CancelToken>,
    ) -> Result<VisionResponse, VisionApiError> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(VisionApiError::Cancelled);
        }

        let url = format!("{}/v1/extract", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(|e| VisionApiError::Http(e.to_string()))?;

        // The blocking transport has no mid-flight abort; a token triggered
        // while the request was out is honored as soon as it returns.
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(VisionApiError::Cancelled);
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        let parsed: WireResponse = response
            .json()
            .map_err(|e| VisionApiError::ResponseParsing(e.to_string()))?;

        let content = parsed
            .content_blocks
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(VisionResponse {
            content,
            usage: parsed.usage,
        })
    }
}

/// Map a non-2xx status to the error taxonomy.
fn classify_status(status: u16, body: String) -> VisionApiError {
    match status {
        401 => VisionApiError::AuthFailure(body),
        404 => VisionApiError::NotFound(body),
        429 => VisionApiError::RateLimited(body),
        s if s >= 500 => VisionApiError::ServerError {
            status: s,
            message: body,
        },
        s => VisionApiError::Http(format!("Unexpected HTTP {s}: {body}")),
    }
}

// ═══════════════════════════════════════════════════════════
// VisionExtractor
// ═══════════════════════════════════════════════════════════

/// Paid extraction front-end: cache check, instruction selection, pricing,
/// cost bookkeeping.
pub struct VisionExtractor {
    api: Box<dyn VisionApi>,
    cache: ExtractionCache,
    costs: CostTracker,
    rates: CostRates,
    cache_ttl_secs: i64,
}

impl VisionExtractor {
    pub fn new(
        api: Box<dyn VisionApi>,
        cache: ExtractionCache,
        costs: CostTracker,
        rates: CostRates,
        cache_ttl_secs: i64,
    ) -> Self {
        Self {
            api,
            cache,
            costs,
            rates,
            cache_ttl_secs,
        }
    }

    /// Extract text from a preprocessed payload via the remote service.
    ///
    /// A byte-identical payload with the same document type within the TTL
    /// window is served from the cache: no network call, zero cost.
    pub fn extract_remote(
        &mut self,
        payload: &ImagePayload,
        document_type: DocumentType,
        cancel: Option<&CancelToken>,
    ) -> Result<RemoteExtractionResult, ExtractionError> {
        let _span = tracing::info_span!(
            "vision_extract",
            document_type = %document_type,
            payload_bytes = payload.byte_size,
        )
        .entered();
        let start = Instant::now();

        let key = CacheKey::for_payload(payload, document_type);
        if let Some(entry) = self.cache.get(&key)? {
            info!(hash = %key.hash, "Serving remote extraction from cache");
            let mut result = entry.data;
            result.from_cache = true;
            result.cost = 0.0;
            return Ok(result);
        }

        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(VisionApiError::Cancelled.into());
            }
        }

        let request = VisionRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(&payload.bytes),
            mime_type: payload.mime.mime_type().to_string(),
            instruction: instruction_for(document_type).to_string(),
        };

        let response = match self.api.extract(&request, cancel) {
            Ok(response) => response,
            Err(error) => {
                // An aborted call surfaces as Cancelled, never as the
                // HTTP-shaped error the abort produced.
                if cancel.is_some_and(|token| token.is_cancelled()) {
                    return Err(VisionApiError::Cancelled.into());
                }
                return Err(error.into());
            }
        };

        // A token triggered while the call was in flight wins even when the
        // transport delivered a response: nothing is cached or charged.
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(VisionApiError::Cancelled.into());
        }

        let usage = response.usage;
        let cost = (usage.input_tokens as f64 / 1000.0) * self.rates.input_per_1k
            + (usage.output_tokens as f64 / 1000.0) * self.rates.output_per_1k;

        let result = RemoteExtractionResult {
            confidence: estimate_confidence(&response.content),
            extracted_text: response.content,
            tokens_used: usage.input_tokens + usage.output_tokens,
            cost,
            processing_time_ms: start.elapsed().as_millis() as u64,
            from_cache: false,
        };

        self.cache.set(&key, &result, self.cache_ttl_secs)?;
        self.costs.track(cost)?;

        info!(
            tokens = result.tokens_used,
            cost,
            confidence = result.confidence,
            elapsed_ms = result.processing_time_ms,
            "Remote extraction complete"
        );
        Ok(result)
    }

    pub fn cache_stats(&self) -> Result<CacheStats, StorageError> {
        self.cache.stats()
    }

    pub fn cost_snapshot(&mut self) -> Result<CostSnapshot, StorageError> {
        self.costs.get_costs()
    }

    pub fn clear_cache(&mut self) -> Result<(), StorageError> {
        self.cache.clear()
    }
}

// ═══════════════════════════════════════════════════════════
// MockVisionApi
// ═══════════════════════════════════════════════════════════

/// Mock remote service: configurable response, counts calls.
pub struct MockVisionApi {
    response_text: String,
    usage: VisionUsage,
    error: Option<fn() -> VisionApiError>,
    calls: std::cell::Cell<u32>,
}

impl MockVisionApi {
    pub fn new(response_text: &str) -> Self {
        Self {
            response_text: response_text.to_string(),
            usage: VisionUsage {
                input_tokens: 1000,
                output_tokens: 200,
            },
            error: None,
            calls: std::cell::Cell::new(0),
        }
    }

    pub fn with_usage(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.usage = VisionUsage {
            input_tokens,
            output_tokens,
        };
        self
    }

    pub fn failing_with(mut self, error: fn() -> VisionApiError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.get()
    }
}

impl VisionApi for MockVisionApi {
    fn extract(
        &self,
        _request: &VisionRequest,
        _cancel: Option<&CancelToken>,
    ) -> Result<VisionResponse, VisionApiError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(make_error) = self.error {
            return Err(make_error());
        }
        Ok(VisionResponse {
            content: self.response_text.clone(),
            usage: self.usage,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
