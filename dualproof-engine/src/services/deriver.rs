//! Royalty event derivation
//!
//! Turns a `pending` correlation into exactly one royalty event per
//! (track, result) pair. Exactly-once is enforced by the storage-level
//! UNIQUE constraint: the insert runs `ON CONFLICT DO NOTHING` and a loser
//! of a concurrent race re-reads the winner's row. Different pairs never
//! contend; the same pair serializes to a single winner even across
//! processes.

use crate::db::{results, royalty_events, usage_logs};
use crate::error::{EngineError, EngineResult};
use crate::services::correlator::{Correlation, CorrelationStatus, Correlator};
use crate::services::policy::AttributionPolicy;
use dualproof_common::db::models::{AttributionMatch, RoyaltyEvent, RoyaltyStatus};
use dualproof_common::{time, EngineConfig};
use rand::Rng;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// One payout line of a result's split table
#[derive(Debug, Clone, PartialEq)]
pub struct SplitLine {
    pub track_id: Uuid,
    pub similarity: f32,
    /// Influence share the amount was computed from
    pub payout_weight: f32,
    pub amount_cents: i64,
}

/// Derivation outcome; both variants carry the authoritative row
#[derive(Debug, Clone)]
pub enum DeriveOutcome {
    /// This call created the event
    Created(RoyaltyEvent),
    /// The event already existed (earlier run, or a lost race)
    Existing(RoyaltyEvent),
}

impl DeriveOutcome {
    pub fn event(&self) -> &RoyaltyEvent {
        match self {
            DeriveOutcome::Created(event) | DeriveOutcome::Existing(event) => event,
        }
    }

    pub fn into_event(self) -> RoyaltyEvent {
        match self {
            DeriveOutcome::Created(event) | DeriveOutcome::Existing(event) => event,
        }
    }
}

/// Split a result's payable amount across its matches
///
/// Proportional to influence share among matches at or above `min_floor`,
/// renormalized over the qualifying shares. Per-line amounts round to the
/// nearest cent and the signed rounding remainder lands on the
/// highest-influence line, so the returned lines always sum exactly to
/// `base_amount_cents` (or the list is empty when nothing qualifies).
pub fn compute_splits(
    matches: &[AttributionMatch],
    base_amount_cents: i64,
    min_floor: f32,
) -> Vec<SplitLine> {
    let qualifying: Vec<&AttributionMatch> = matches
        .iter()
        .filter(|m| m.influence_share >= min_floor)
        .collect();

    let total_share: f64 = qualifying.iter().map(|m| m.influence_share as f64).sum();
    if qualifying.is_empty() || total_share <= 0.0 {
        return Vec::new();
    }

    let mut lines: Vec<SplitLine> = qualifying
        .iter()
        .map(|m| SplitLine {
            track_id: m.track_id,
            similarity: m.similarity,
            payout_weight: m.influence_share,
            amount_cents: (base_amount_cents as f64 * m.influence_share as f64 / total_share)
                .round() as i64,
        })
        .collect();

    let allocated: i64 = lines.iter().map(|l| l.amount_cents).sum();
    let remainder = base_amount_cents - allocated;

    // Remainder to the highest-influence line (first such line on a tie).
    // It can be negative when rounding over-allocated.
    if remainder != 0 {
        if let Some(top) = lines.iter_mut().reduce(|best, line| {
            if line.payout_weight > best.payout_weight {
                line
            } else {
                best
            }
        }) {
            top.amount_cents += remainder;
        }
    }

    lines
}

/// Derives royalty events from pending correlations
pub struct Deriver {
    db: SqlitePool,
    correlator: Correlator,
    policy: AttributionPolicy,
    base_amount_cents: i64,
    min_influence_floor: f32,
}

impl Deriver {
    pub fn new(db: SqlitePool, config: &EngineConfig) -> Self {
        Self {
            correlator: Correlator::new(db.clone(), config),
            policy: AttributionPolicy::new(config),
            db,
            base_amount_cents: config.base_amount_cents,
            min_influence_floor: config.min_influence_floor,
        }
    }

    /// Derive the royalty event for a result's correlated pair
    ///
    /// - correlation `none` fails with `PolicyNotMet`;
    /// - correlation `confirmed` returns the existing event;
    /// - correlation `pending` inserts exactly one event and attaches the
    ///   result back-reference to the usage log.
    pub async fn derive_for_result(&self, result_id: Uuid) -> EngineResult<DeriveOutcome> {
        let correlation = self.correlator.status_for_result(result_id).await?;

        let track_id = correlation.track_id.unwrap_or(Uuid::nil());

        match correlation.status {
            CorrelationStatus::Confirmed => {
                let event = royalty_events::find_by_pair(&self.db, track_id, result_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::NotFound(format!("royalty event for result {}", result_id))
                    })?;
                Ok(DeriveOutcome::Existing(event))
            }
            CorrelationStatus::None => Err(EngineError::PolicyNotMet {
                result_id,
                track_id,
            }),
            CorrelationStatus::Pending => self.insert_pending(result_id, &correlation).await,
        }
    }

    async fn insert_pending(
        &self,
        result_id: Uuid,
        correlation: &Correlation,
    ) -> EngineResult<DeriveOutcome> {
        let track_id = correlation.track_id.unwrap_or(Uuid::nil());
        let usage_log_id = correlation.usage_log_id;

        let result = results::load_result(&self.db, result_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("result {}", result_id)))?;

        // Payability gates derivation alongside the correlation threshold
        if !self.policy.is_payable(&result.matches) {
            return Err(EngineError::PolicyNotMet {
                result_id,
                track_id,
            });
        }

        let splits = compute_splits(&result.matches, self.base_amount_cents, self.min_influence_floor);
        let Some(line) = splits.iter().find(|l| l.track_id == track_id) else {
            // The correlated match fell below the influence floor
            return Err(EngineError::PolicyNotMet {
                result_id,
                track_id,
            });
        };

        let event = RoyaltyEvent {
            id: Uuid::new_v4(),
            track_id,
            result_id,
            usage_log_id,
            similarity: line.similarity,
            payout_weight: line.payout_weight,
            amount_cents: line.amount_cents,
            status: RoyaltyStatus::Pending,
            verified_at: time::now(),
        };

        let inserted = self.insert_with_retry(&event).await?;

        if inserted {
            if let Some(log_id) = usage_log_id {
                usage_logs::attach_result(&self.db, log_id, result_id).await?;
            }
            info!(
                event_id = %event.id,
                track_id = %track_id,
                result_id = %result_id,
                amount_cents = event.amount_cents,
                payout_weight = event.payout_weight,
                "Royalty event derived"
            );
            Ok(DeriveOutcome::Created(event))
        } else {
            // Lost the race; the winner's row is the authoritative record
            let existing = royalty_events::find_by_pair(&self.db, track_id, result_id)
                .await?
                .ok_or_else(|| EngineError::DerivationFailed {
                    result_id,
                    track_id,
                    source: dualproof_common::Error::Internal(
                        "insert conflicted but no row found on re-read".to_string(),
                    ),
                })?;
            Ok(DeriveOutcome::Existing(existing))
        }
    }

    /// Attempt the atomic insert, retrying once with jittered backoff
    async fn insert_with_retry(&self, event: &RoyaltyEvent) -> EngineResult<bool> {
        match royalty_events::insert_event_once(&self.db, event).await {
            Ok(inserted) => Ok(inserted),
            Err(first_err) => {
                warn!(
                    track_id = %event.track_id,
                    result_id = %event.result_id,
                    error = %first_err,
                    "Royalty event insert failed, retrying once"
                );
                let jitter_ms = rand::thread_rng().gen_range(100..250);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

                royalty_events::insert_event_once(&self.db, event)
                    .await
                    .map_err(|source| EngineError::DerivationFailed {
                        result_id: event.result_id,
                        track_id: event.track_id,
                        source,
                    })
            }
        }
    }
}
