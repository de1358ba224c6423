//! Device health tracking for the Vantage platform.
//!
//! Provides:
//! - The health state machine turning liveness reports into status
//!   transitions, with per-class staleness windows
//! - Incident deduplication and operator notification
//! - Reconciliation: per-box configuration resync and the scheduled
//!   maintenance sweep

pub mod incident;
pub mod monitor;
pub mod reconcile;

use thiserror::Error;

use vantage_core::StoreError;

/// Health pipeline errors.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("encode error: {0}")]
    Encode(String),
}

// Re-exports
pub use incident::{IncidentDeduplicator, IncidentOutcome};

pub use monitor::{HealthConfig, HealthMonitor, LivenessReport, SweepStats};

pub use reconcile::{Reconciler, ReconcilerConfig};
