//! Crate-wide error type unifying the per-subsystem error kinds from
//! validation, storage, the hazard-zone index, the LLM client, and
//! geocoding into one tagged result type callers can match on.
//!
//! Each subsystem keeps its own local error enum (`ValidationError`,
//! `StoreError`, `LlmError`, `GeocodeError`) close to where it's produced;
//! this type exists for the orchestrators, which need to report a uniform
//! outcome without losing the subsystem detail.

use thiserror::Error;

use crate::llm::LlmError;
use crate::store::StoreError;
use crate::validate::ValidationError;

#[derive(Debug, Error)]
pub enum OpenLewsError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("location resolution failed: {0}")]
    LocationResolve(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("run deadline exceeded")]
    Deadline,
}
