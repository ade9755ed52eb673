//! Running spend totals for paid extraction calls.
//!
//! One record in the key-value store: `{daily, monthly, last_reset_date}`.
//! On every read or write, a date change since `last_reset_date` zeroes the
//! daily total first. The monthly total never auto-resets here — if a reset
//! is wanted, it belongs to an external collaborator.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::{KeyValueStore, StorageError};

const COST_KEY: &str = "extraction_costs";

/// Per-call pricing, dollars per 1000 tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRates {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
    pub cache_read_per_1k: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            input_per_1k: 0.003,
            output_per_1k: 0.015,
            cache_read_per_1k: 0.0003,
        }
    }
}

/// Point-in-time view of accumulated spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub daily: f64,
    pub monthly: f64,
    pub last_reset_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
struct CostRecord {
    daily: f64,
    monthly: f64,
    last_reset_date: NaiveDate,
}

/// Tracker over an injected key-value backend.
pub struct CostTracker {
    store: Box<dyn KeyValueStore>,
}

impl CostTracker {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Record spend from one remote call.
    pub fn track(&mut self, cost: f64) -> Result<(), StorageError> {
        self.track_at(cost, Local::now().date_naive())
    }

    /// Current totals, applying the daily reset if the date rolled over.
    pub fn get_costs(&mut self) -> Result<CostSnapshot, StorageError> {
        self.get_costs_at(Local::now().date_naive())
    }

    pub(crate) fn track_at(&mut self, cost: f64, today: NaiveDate) -> Result<(), StorageError> {
        let mut record = self.load(today)?;
        record.daily += cost;
        record.monthly += cost;
        debug!(cost, daily = record.daily, monthly = record.monthly, "Tracked extraction cost");
        self.persist(&record)
    }

    pub(crate) fn get_costs_at(&mut self, today: NaiveDate) -> Result<CostSnapshot, StorageError> {
        let record = self.load(today)?;
        // Persist the reset so a later read on the same day agrees.
        self.persist(&record)?;
        Ok(CostSnapshot {
            daily: record.daily,
            monthly: record.monthly,
            last_reset_date: record.last_reset_date,
        })
    }

    /// Load the record, zeroing the daily total when the date changed.
    fn load(&self, today: NaiveDate) -> Result<CostRecord, StorageError> {
        let mut record = match self.store.get(COST_KEY)? {
            Some(raw) => serde_json::from_value(raw)?,
            None => CostRecord {
                daily: 0.0,
                monthly: 0.0,
                last_reset_date: today,
            },
        };

        if record.last_reset_date != today {
            record.daily = 0.0;
            record.last_reset_date = today;
        }
        Ok(record)
    }

    fn persist(&mut self, record: &CostRecord) -> Result<(), StorageError> {
        self.store.set(COST_KEY, serde_json::to_value(record)?)
    }
}
