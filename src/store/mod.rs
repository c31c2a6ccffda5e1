//! Storage interfaces (spec §6): the core only ever talks to these
//! traits. `memory` backs tests; `postgres` is the reference production
//! adapter, generalized from the teacher's connection/validation pattern.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use thiserror::Error;

use crate::model::{Alert, HazardZone, Reading};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Put/get retried internally and still failed. Recorded; batch
    /// continues.
    #[error("storage transient error: {0}")]
    Transient(String),

    /// Authoritative rejection (unknown table, schema mismatch). Aborts
    /// the run.
    #[error("storage fatal error: {0}")]
    Fatal(String),
}

pub trait TelemetryStore {
    fn put_batch(&self, readings: &[Reading]) -> Vec<Result<(), StoreError>>;
    fn query_by_time(&self, range_start: i64, range_end: i64, limit: Option<usize>) -> Result<Vec<Reading>, StoreError>;
    fn latest_per_sensor(&self, range_start: i64, range_end: i64) -> Result<Vec<Reading>, StoreError>;
}

pub trait ZoneStore {
    fn find_by_geohash4(&self, cell: &str) -> Result<Vec<HazardZone>, StoreError>;
}

pub trait AlertStore {
    fn get_active_by_prefix(&self, prefix: &str, within: Duration) -> Result<Option<Alert>, StoreError>;
    /// Conditional upsert: rejected (as a `StoreError::Transient`, so the
    /// caller can retry) if `alert.risk_level` ordinal would regress an
    /// existing row's ordinal.
    fn upsert_alert(&self, alert: &Alert) -> Result<(), StoreError>;
    /// All alerts currently `Active`, for the periodic expiry sweep
    /// (`alert::manager::AlertManager::expire`).
    fn list_active(&self) -> Result<Vec<Alert>, StoreError>;
}
