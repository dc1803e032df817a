//! Row access for the engine's storage collaborators
//!
//! The engine reads tracks and usage logs, and owns results and royalty
//! events. All timestamps go through `dualproof_common::time` so window
//! queries can compare them lexicographically.

pub mod results;
pub mod royalty_events;
pub mod tracks;
pub mod usage_logs;

use dualproof_common::{Error, Result};
use uuid::Uuid;

/// Parse a stored UUID column
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::InvalidInput(format!("Bad UUID '{}': {}", s, e)))
}
