//! Engine configuration
//!
//! Every tunable the engine consumes lives in [`EngineConfig`], which is
//! constructed once at startup and injected into each component. There is no
//! ambient environment lookup inside the engine itself.
//!
//! Resolution priority: environment variables -> TOML config file ->
//! compiled defaults. Validation runs after resolution and fails fast on
//! out-of-range values.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable prefix for config overrides
const ENV_PREFIX: &str = "DUALPROOF_";

/// Engine-wide tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Payability: minimum top-match similarity (default 0.80)
    pub s_max_threshold: f32,

    /// Payability: minimum summed influence share (default 0.20)
    pub s_total_threshold: f32,

    /// Correlation: minimum similarity for dual-proof alignment (default 0.85)
    pub s_corr_threshold: f32,

    /// Correlation window half-width in minutes, inclusive on both bounds.
    /// Sized to absorb clock drift between partner and scorer clocks.
    pub correlation_window_minutes: i64,

    /// Embedding vector dimensionality (default 512)
    pub embedding_dim: usize,

    /// Ranked match list truncation (default 3)
    pub top_n_matches: usize,

    /// Total payable amount per result, in cents (default 100).
    /// Placeholder for a future per-track / per-partner rate.
    pub base_amount_cents: i64,

    /// Matches with influence share below this floor get no split line
    pub min_influence_floor: f32,

    /// Auditor sweep: how far back to scan for unprocessed results, in hours
    pub time_window_hours: i64,

    /// Auditor sweep: maximum results per sweep
    pub batch_size: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            s_max_threshold: 0.80,
            s_total_threshold: 0.20,
            s_corr_threshold: 0.85,
            correlation_window_minutes: 10,
            embedding_dim: 512,
            top_n_matches: 3,
            base_amount_cents: 100,
            min_influence_floor: 0.01,
            time_window_hours: 24,
            batch_size: 100,
        }
    }
}

impl EngineConfig {
    /// Load configuration with ENV -> TOML -> defaults priority
    ///
    /// `config_path` overrides the default TOML location
    /// (`~/.config/dualproof/dualproof.toml`). A missing file is not an
    /// error; a malformed one is.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_file(config_path) {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
                let config: EngineConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
                info!("Engine config loaded from {}", path.display());
                config
            }
            None => EngineConfig::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DUALPROOF_*` environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        override_from_env(&mut self.s_max_threshold, "S_MAX_THRESHOLD")?;
        override_from_env(&mut self.s_total_threshold, "S_TOTAL_THRESHOLD")?;
        override_from_env(&mut self.s_corr_threshold, "S_CORR_THRESHOLD")?;
        override_from_env(&mut self.correlation_window_minutes, "CORRELATION_WINDOW_MINUTES")?;
        override_from_env(&mut self.embedding_dim, "EMBEDDING_DIM")?;
        override_from_env(&mut self.top_n_matches, "TOP_N_MATCHES")?;
        override_from_env(&mut self.base_amount_cents, "BASE_AMOUNT_CENTS")?;
        override_from_env(&mut self.min_influence_floor, "MIN_INFLUENCE_FLOOR")?;
        override_from_env(&mut self.time_window_hours, "TIME_WINDOW_HOURS")?;
        override_from_env(&mut self.batch_size, "BATCH_SIZE")?;
        Ok(())
    }

    /// Validate all tunables, failing fast before any component runs
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("s_max_threshold", self.s_max_threshold),
            ("s_total_threshold", self.s_total_threshold),
            ("s_corr_threshold", self.s_corr_threshold),
            ("min_influence_floor", self.min_influence_floor),
        ] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(Error::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.correlation_window_minutes <= 0 {
            return Err(Error::Config(format!(
                "correlation_window_minutes must be positive, got {}",
                self.correlation_window_minutes
            )));
        }
        if self.embedding_dim == 0 {
            return Err(Error::Config("embedding_dim must be positive".to_string()));
        }
        if self.top_n_matches == 0 {
            return Err(Error::Config("top_n_matches must be positive".to_string()));
        }
        if self.base_amount_cents <= 0 {
            return Err(Error::Config(format!(
                "base_amount_cents must be positive, got {}",
                self.base_amount_cents
            )));
        }
        if self.time_window_hours <= 0 {
            return Err(Error::Config(format!(
                "time_window_hours must be positive, got {}",
                self.time_window_hours
            )));
        }
        if self.batch_size <= 0 {
            return Err(Error::Config(format!(
                "batch_size must be positive, got {}",
                self.batch_size
            )));
        }
        Ok(())
    }

    /// Correlation window half-width as a chrono duration
    pub fn correlation_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.correlation_window_minutes)
    }

    /// Auditor scan horizon as a chrono duration
    pub fn time_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.time_window_hours)
    }
}

/// Parse one `DUALPROOF_*` environment variable into a config field
fn override_from_env<T: std::str::FromStr>(slot: &mut T, key: &str) -> Result<()> {
    let var = format!("{}{}", ENV_PREFIX, key);
    if let Ok(raw) = std::env::var(&var) {
        *slot = raw
            .parse()
            .map_err(|_| Error::Config(format!("Could not parse {}='{}'", var, raw)))?;
    }
    Ok(())
}

/// Resolve which TOML file to read, if any
fn resolve_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let default = dirs::config_dir().map(|d| d.join("dualproof").join("dualproof.toml"))?;
    if default.exists() {
        Some(default)
    } else {
        None
    }
}
