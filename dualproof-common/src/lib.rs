//! # Dualproof Common Library
//!
//! Shared code for the dualproof attribution engine:
//! - Database models and schema bootstrap
//! - Engine configuration (thresholds, correlation window)
//! - Common error types
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use config::EngineConfig;
pub use error::{Error, Result};
