//! Attribution correlation and royalty event engine
//!
//! Scores probe audio against a fingerprinted track catalog, gates
//! payability on deterministic thresholds, correlates partner usage logs
//! with similarity results inside a time window (dual proof), and derives
//! exactly one royalty event per correlated (track, result) pair.
//!
//! The engine is a library: it owns no network surface and no global
//! state. Every component takes its database pool and [`EngineConfig`]
//! at construction.

pub mod db;
pub mod error;
pub mod services;

pub use dualproof_common::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use services::{
    Auditor, AttributionPolicy, Correlation, CorrelationStatus, Correlator, DeriveOutcome,
    Deriver, Embedder, Scorer, SweepReport,
};
