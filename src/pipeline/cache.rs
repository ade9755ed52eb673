//! Content-addressed cache for paid remote extraction results.
//!
//! The key is a deterministic hash of the full payload bytes, its mime type,
//! and the document type: two pixel-identical documents of the same type
//! always collide, two different ones practically never do. Entries expire
//! after a TTL; an expired `get` behaves as a miss and evicts the entry.
//! Hit/miss counters live on the cache object and survive entry eviction.

use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::preprocess::ImagePayload;
use super::prompt::DocumentType;
use super::types::RemoteExtractionResult;
use crate::storage::{KeyValueStore, StorageError};

/// Identity of one cached extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub document_type: DocumentType,
    pub hash: String,
}

impl CacheKey {
    /// Hash payload bytes + mime + document type into a cache key.
    pub fn for_payload(payload: &ImagePayload, document_type: DocumentType) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&payload.bytes);
        hasher.update(payload.mime.mime_type().as_bytes());
        hasher.update(document_type.as_str().as_bytes());
        let digest = hasher.finalize();

        Self {
            document_type,
            hash: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest),
        }
    }

    /// Key-value slot: `ocr_{documentType}_{hash}`.
    pub fn storage_key(&self) -> String {
        format!("ocr_{}_{}", self.document_type.as_str(), self.hash)
    }
}

/// One stored extraction with its expiry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: RemoteExtractionResult,
    /// Unix seconds at write time.
    pub timestamp: i64,
    pub expires_at: i64,
    /// What the original call cost — the amount a hit saves.
    pub cost: f64,
}

/// Lifetime statistics for the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_cost_saved: f64,
    /// hits / (hits + misses); 0.0 before any lookup.
    pub hit_rate: f64,
    pub oldest_entry_age_secs: Option<i64>,
}

const ENTRY_PREFIX: &str = "ocr_";

/// Content-addressed store over an injected key-value backend.
pub struct ExtractionCache {
    store: Box<dyn KeyValueStore>,
    hits: u64,
    misses: u64,
    cost_saved: f64,
}

impl ExtractionCache {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            hits: 0,
            misses: 0,
            cost_saved: 0.0,
        }
    }

    /// Look up an entry. Expired entries count as misses and are evicted.
    pub fn get(&mut self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
        self.get_at(key, Utc::now().timestamp())
    }

    pub(crate) fn get_at(
        &mut self,
        key: &CacheKey,
        now: i64,
    ) -> Result<Option<CacheEntry>, StorageError> {
        let storage_key = key.storage_key();
        let Some(raw) = self.store.get(&storage_key)? else {
            self.misses += 1;
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_value(raw)?;
        if now >= entry.expires_at {
            debug!(key = %storage_key, "Cache entry expired, evicting");
            self.store.remove(&storage_key)?;
            self.misses += 1;
            return Ok(None);
        }

        self.hits += 1;
        self.cost_saved += entry.cost;
        Ok(Some(entry))
    }

    /// Store a result with a time-to-live in seconds.
    pub fn set(
        &mut self,
        key: &CacheKey,
        result: &RemoteExtractionResult,
        ttl_secs: i64,
    ) -> Result<(), StorageError> {
        self.set_at(key, result, ttl_secs, Utc::now().timestamp())
    }

    pub(crate) fn set_at(
        &mut self,
        key: &CacheKey,
        result: &RemoteExtractionResult,
        ttl_secs: i64,
        now: i64,
    ) -> Result<(), StorageError> {
        let entry = CacheEntry {
            data: result.clone(),
            timestamp: now,
            expires_at: now + ttl_secs,
            cost: result.cost,
        };
        self.store
            .set(&key.storage_key(), serde_json::to_value(&entry)?)
    }

    pub fn delete(&mut self, key: &CacheKey) -> Result<(), StorageError> {
        self.store.remove(&key.storage_key())
    }

    /// Drop every cache entry. Counters are untouched.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        for key in self.entry_keys()? {
            self.store.remove(&key)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats, StorageError> {
        self.stats_at(Utc::now().timestamp())
    }

    pub(crate) fn stats_at(&self, now: i64) -> Result<CacheStats, StorageError> {
        let mut total_entries = 0;
        let mut oldest_timestamp: Option<i64> = None;

        for key in self.entry_keys()? {
            if let Some(raw) = self.store.get(&key)? {
                let entry: CacheEntry = serde_json::from_value(raw)?;
                total_entries += 1;
                oldest_timestamp = Some(match oldest_timestamp {
                    Some(t) => t.min(entry.timestamp),
                    None => entry.timestamp,
                });
            }
        }

        let lookups = self.hits + self.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };

        Ok(CacheStats {
            total_entries,
            total_cost_saved: self.cost_saved,
            hit_rate,
            oldest_entry_age_secs: oldest_timestamp.map(|t| now - t),
        })
    }

    fn entry_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(ENTRY_PREFIX))
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::preprocess::PayloadMime;
    use crate::storage::MemoryStore;

    fn payload(bytes: &[u8]) -> ImagePayload {
        ImagePayload {
            bytes: bytes.to_vec(),
            mime: PayloadMime::Jpeg,
            byte_size: bytes.len(),
        }
    }

    fn result(text: &str, cost: f64) -> RemoteExtractionResult {
        RemoteExtractionResult {
            extracted_text: text.to_string(),
            confidence: 0.8,
            tokens_used: 1200,
            cost,
            processing_time_ms: 900,
            from_cache: false,
        }
    }

    fn cache() -> ExtractionCache {
        ExtractionCache::new(Box::new(MemoryStore::new()))
    }

    // ── Keys ──

    #[test]
    fn identical_inputs_share_a_key() {
        let a = CacheKey::for_payload(&payload(b"same-bytes"), DocumentType::Generic);
        let b = CacheKey::for_payload(&payload(b"same-bytes"), DocumentType::Generic);
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_different_key() {
        let a = CacheKey::for_payload(&payload(b"bytes-a"), DocumentType::Generic);
        let b = CacheKey::for_payload(&payload(b"bytes-b"), DocumentType::Generic);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn document_type_is_part_of_identity() {
        let a = CacheKey::for_payload(&payload(b"same"), DocumentType::Generic);
        let b = CacheKey::for_payload(&payload(b"same"), DocumentType::LabReport);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn mime_is_part_of_identity() {
        let mut png = payload(b"same");
        png.mime = PayloadMime::Png;
        let a = CacheKey::for_payload(&payload(b"same"), DocumentType::Generic);
        let b = CacheKey::for_payload(&png, DocumentType::Generic);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn storage_key_layout() {
        let key = CacheKey::for_payload(&payload(b"x"), DocumentType::LabReport);
        let storage_key = key.storage_key();
        assert!(storage_key.starts_with("ocr_lab_report_"));
        assert!(storage_key.ends_with(&key.hash));
    }

    // ── Get/set/expiry ──

    #[test]
    fn set_then_get_roundtrip() {
        let mut cache = cache();
        let key = CacheKey::for_payload(&payload(b"doc"), DocumentType::Generic);

        cache.set_at(&key, &result("extracted", 0.05), 3600, 1000).unwrap();
        let entry = cache.get_at(&key, 1010).unwrap().expect("cache hit");

        assert_eq!(entry.data.extracted_text, "extracted");
        assert_eq!(entry.cost, 0.05);
        assert_eq!(entry.expires_at, 4600);
    }

    #[test]
    fn missing_key_is_a_miss() {
        let mut cache = cache();
        let key = CacheKey::for_payload(&payload(b"never-stored"), DocumentType::Form);
        assert!(cache.get_at(&key, 0).unwrap().is_none());

        let stats = cache.stats_at(0).unwrap();
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn expired_entry_behaves_as_miss_and_is_evicted() {
        let mut cache = cache();
        let key = CacheKey::for_payload(&payload(b"doc"), DocumentType::Generic);
        cache.set_at(&key, &result("old", 0.03), 60, 1000).unwrap();

        // At expiry boundary the entry is gone.
        assert!(cache.get_at(&key, 1060).unwrap().is_none());
        // Evicted as a side effect: stats no longer count it.
        assert_eq!(cache.stats_at(1060).unwrap().total_entries, 0);
    }

    #[test]
    fn delete_removes_entry() {
        let mut cache = cache();
        let key = CacheKey::for_payload(&payload(b"doc"), DocumentType::Generic);
        cache.set_at(&key, &result("text", 0.01), 3600, 0).unwrap();
        cache.delete(&key).unwrap();
        assert!(cache.get_at(&key, 1).unwrap().is_none());
    }

    #[test]
    fn clear_removes_all_entries_keeps_counters() {
        let mut cache = cache();
        let k1 = CacheKey::for_payload(&payload(b"a"), DocumentType::Generic);
        let k2 = CacheKey::for_payload(&payload(b"b"), DocumentType::Form);
        cache.set_at(&k1, &result("a", 0.01), 3600, 0).unwrap();
        cache.set_at(&k2, &result("b", 0.02), 3600, 0).unwrap();
        cache.get_at(&k1, 1).unwrap();

        cache.clear().unwrap();

        let stats = cache.stats_at(1).unwrap();
        assert_eq!(stats.total_entries, 0);
        assert!(stats.hit_rate > 0.0, "counters survive clear");
    }

    // ── Stats ──

    #[test]
    fn hit_rate_counts_lifetime_lookups() {
        let mut cache = cache();
        let key = CacheKey::for_payload(&payload(b"doc"), DocumentType::Generic);
        cache.set_at(&key, &result("text", 0.04), 3600, 0).unwrap();

        cache.get_at(&key, 1).unwrap(); // hit
        cache.get_at(&key, 1).unwrap(); // hit
        let other = CacheKey::for_payload(&payload(b"other"), DocumentType::Generic);
        cache.get_at(&other, 1).unwrap(); // miss

        let stats = cache.stats_at(1).unwrap();
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn cost_saved_accumulates_per_hit() {
        let mut cache = cache();
        let key = CacheKey::for_payload(&payload(b"doc"), DocumentType::Generic);
        cache.set_at(&key, &result("text", 0.05), 3600, 0).unwrap();

        cache.get_at(&key, 1).unwrap();
        cache.get_at(&key, 1).unwrap();

        let stats = cache.stats_at(1).unwrap();
        assert!((stats.total_cost_saved - 0.10).abs() < 1e-9);
    }

    #[test]
    fn oldest_entry_age() {
        let mut cache = cache();
        let k1 = CacheKey::for_payload(&payload(b"a"), DocumentType::Generic);
        let k2 = CacheKey::for_payload(&payload(b"b"), DocumentType::Generic);
        cache.set_at(&k1, &result("a", 0.0), 9999, 100).unwrap();
        cache.set_at(&k2, &result("b", 0.0), 9999, 500).unwrap();

        let stats = cache.stats_at(600).unwrap();
        assert_eq!(stats.oldest_entry_age_secs, Some(500));
    }

    #[test]
    fn empty_cache_stats() {
        let cache = cache();
        let stats = cache.stats_at(0).unwrap();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.oldest_entry_age_secs, None);
        assert_eq!(stats.total_cost_saved, 0.0);
    }
}
