//! Attribution auditor sweep
//!
//! Batch job that walks recent high-similarity results without a royalty
//! event, correlates each against partner usage logs, and derives events
//! for the pending ones. Dual proof end to end: nothing is derived unless
//! both the partner log and the auditor detection agree.

use crate::db::results;
use crate::error::{EngineError, EngineResult};
use crate::services::correlator::{CorrelationStatus, Correlator};
use crate::services::deriver::{DeriveOutcome, Deriver};
use dualproof_common::{time, EngineConfig};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Counters from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    /// Results examined
    pub scanned: usize,
    /// Results with a pending correlation
    pub correlated: usize,
    /// Royalty events created
    pub derived: usize,
    /// Results skipped (no correlation, already derived, or failed)
    pub skipped: usize,
}

/// Periodic dual-proof verification job
pub struct Auditor {
    db: SqlitePool,
    config: EngineConfig,
    correlator: Correlator,
    deriver: Deriver,
    dry_run: bool,
}

impl Auditor {
    pub fn new(db: SqlitePool, config: EngineConfig) -> Self {
        Self {
            correlator: Correlator::new(db.clone(), &config),
            deriver: Deriver::new(db.clone(), &config),
            db,
            config,
            dry_run: false,
        }
    }

    /// Correlate but never derive
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one sweep over recent unprocessed results
    pub async fn sweep(&self) -> EngineResult<SweepReport> {
        let since = time::now() - self.config.time_window();
        let candidates = results::find_unprocessed_since(
            &self.db,
            since,
            self.config.s_corr_threshold,
            self.config.batch_size,
        )
        .await?;

        info!(
            candidates = candidates.len(),
            threshold = self.config.s_corr_threshold,
            "Auditor sweep started"
        );

        let mut report = SweepReport::default();
        for result_id in candidates {
            report.scanned += 1;

            let correlation = self.correlator.status_for_result(result_id).await?;
            if correlation.status != CorrelationStatus::Pending {
                report.skipped += 1;
                continue;
            }
            report.correlated += 1;

            if self.dry_run {
                info!(result_id = %result_id, "Dry run: pending pair left underived");
                continue;
            }

            match self.deriver.derive_for_result(result_id).await {
                Ok(DeriveOutcome::Created(event)) => {
                    report.derived += 1;
                    info!(
                        result_id = %result_id,
                        event_id = %event.id,
                        amount_cents = event.amount_cents,
                        "Sweep derived royalty event"
                    );
                }
                Ok(DeriveOutcome::Existing(_)) => {
                    report.skipped += 1;
                }
                Err(EngineError::PolicyNotMet { .. }) => {
                    // Rows changed between correlate and derive; not a failure
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(result_id = %result_id, error = %e, "Sweep derivation failed");
                    report.skipped += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            correlated = report.correlated,
            derived = report.derived,
            skipped = report.skipped,
            "Auditor sweep finished"
        );
        Ok(report)
    }
}
