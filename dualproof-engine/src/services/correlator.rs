//! Dual-proof correlation
//!
//! Joins two independently-timestamped collections (partner usage logs
//! and attribution results) by track identity and time proximity. Status
//! is recomputed from current rows on every query and never stored, so it
//! cannot go stale. Both entry points (result-anchored and log-anchored)
//! share the same thresholds, window arithmetic, and tie-breaks; for a
//! given underlying pair they report the same status and ids.
//!
//! This is a pure read path: it never writes, and may run concurrently
//! with derivations against the same rows without coordination.

use crate::db::{results, royalty_events, usage_logs};
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use dualproof_common::EngineConfig;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Tri-state correlation status, recomputed on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationStatus {
    /// No correlation found
    None,
    /// A usage log and a result align but no royalty event exists yet
    Pending,
    /// A royalty event already links the pair
    Confirmed,
}

impl CorrelationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationStatus::None => "none",
            CorrelationStatus::Pending => "pending",
            CorrelationStatus::Confirmed => "confirmed",
        }
    }
}

/// Correlation query outcome with every id needed for the audit trail
#[derive(Debug, Clone)]
pub struct Correlation {
    pub status: CorrelationStatus,
    pub track_id: Option<Uuid>,
    pub result_id: Option<Uuid>,
    pub usage_log_id: Option<Uuid>,
    pub royalty_event_id: Option<Uuid>,
    pub similarity: Option<f32>,
    pub sdk_confidence: Option<f32>,
}

impl Correlation {
    fn none() -> Self {
        Self {
            status: CorrelationStatus::None,
            track_id: None,
            result_id: None,
            usage_log_id: None,
            royalty_event_id: None,
            similarity: None,
            sdk_confidence: None,
        }
    }
}

/// Symmetric correlator over usage logs and results
pub struct Correlator {
    db: SqlitePool,
    threshold: f32,
    window: chrono::Duration,
}

impl Correlator {
    pub fn new(db: SqlitePool, config: &EngineConfig) -> Self {
        Self {
            db,
            threshold: config.s_corr_threshold,
            window: config.correlation_window(),
        }
    }

    /// Correlation status anchored on a result
    ///
    /// Candidate matches are considered in rank order. For each track whose
    /// similarity clears the threshold: an existing royalty event means
    /// `confirmed`; otherwise the closest in-window usage log on that track
    /// means `pending`. No qualifying track with a log means `none`.
    pub async fn status_for_result(&self, result_id: Uuid) -> EngineResult<Correlation> {
        let result = results::load_result(&self.db, result_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("result {}", result_id)))?;

        let mut correlation = Correlation::none();
        correlation.result_id = Some(result_id);
        correlation.track_id = Some(result.track_id);
        if !result.matches.is_empty() {
            correlation.similarity = Some(result.top_similarity());
        }

        for m in result.matches.iter().filter(|m| m.similarity >= self.threshold) {
            if let Some(event) =
                royalty_events::find_by_pair(&self.db, m.track_id, result_id).await?
            {
                let sdk_confidence = match event.usage_log_id {
                    Some(log_id) => usage_logs::load_usage_log(&self.db, log_id)
                        .await?
                        .and_then(|log| log.confidence),
                    None => None,
                };
                return Ok(Correlation {
                    status: CorrelationStatus::Confirmed,
                    track_id: Some(m.track_id),
                    result_id: Some(result_id),
                    usage_log_id: event.usage_log_id,
                    royalty_event_id: Some(event.id),
                    similarity: Some(m.similarity),
                    sdk_confidence,
                });
            }

            let (from, to) = self.window_around(result.created_at);
            let logs =
                usage_logs::find_for_track_in_window(&self.db, m.track_id, from, to).await?;
            let stamps: Vec<DateTime<Utc>> = logs.iter().map(|l| l.created_at).collect();
            if let Some(idx) = pick_closest(result.created_at, &stamps) {
                let log = &logs[idx];
                return Ok(Correlation {
                    status: CorrelationStatus::Pending,
                    track_id: Some(m.track_id),
                    result_id: Some(result_id),
                    usage_log_id: Some(log.id),
                    royalty_event_id: None,
                    similarity: Some(m.similarity),
                    sdk_confidence: log.confidence,
                });
            }
        }

        Ok(correlation)
    }

    /// Correlation status anchored on a usage log
    ///
    /// Mirror of [`status_for_result`](Self::status_for_result): an
    /// existing royalty event referencing this log means `confirmed`;
    /// otherwise the closest in-window result with a qualifying match on
    /// the log's track means `pending`.
    pub async fn status_for_usage_log(&self, usage_log_id: Uuid) -> EngineResult<Correlation> {
        let log = usage_logs::load_usage_log(&self.db, usage_log_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("usage log {}", usage_log_id)))?;

        let mut correlation = Correlation::none();
        correlation.usage_log_id = Some(usage_log_id);
        correlation.track_id = Some(log.track_id);
        correlation.sdk_confidence = log.confidence;

        if let Some(event) = royalty_events::find_by_usage_log(&self.db, usage_log_id).await? {
            correlation.status = CorrelationStatus::Confirmed;
            correlation.track_id = Some(event.track_id);
            correlation.result_id = Some(event.result_id);
            correlation.royalty_event_id = Some(event.id);
            correlation.similarity = Some(event.similarity);
            return Ok(correlation);
        }

        let (from, to) = self.window_around(log.created_at);
        let rows = results::find_for_track_in_window(
            &self.db,
            log.track_id,
            from,
            to,
            self.threshold,
        )
        .await?;
        let stamps: Vec<DateTime<Utc>> = rows.iter().map(|r| r.created_at).collect();
        if let Some(idx) = pick_closest(log.created_at, &stamps) {
            let row = &rows[idx];
            correlation.status = CorrelationStatus::Pending;
            correlation.result_id = Some(row.result_id);
            correlation.similarity = Some(row.similarity);
        }

        Ok(correlation)
    }

    /// Inclusive window bounds around an anchor timestamp
    fn window_around(&self, anchor: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (anchor - self.window, anchor + self.window)
    }
}

/// Pick the candidate closest to the anchor timestamp
///
/// Ties by distance go to the most recently created candidate; a residual
/// tie is broken by position so the choice stays deterministic.
fn pick_closest(anchor: DateTime<Utc>, stamps: &[DateTime<Utc>]) -> Option<usize> {
    stamps
        .iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| {
            let dist_a = (**a - anchor).abs();
            let dist_b = (**b - anchor).abs();
            dist_a.cmp(&dist_b).then(b.cmp(a)).then(ia.cmp(ib))
        })
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, minute, second).unwrap()
    }

    #[test]
    fn test_pick_closest_prefers_smallest_distance() {
        let anchor = at(30, 0);
        let stamps = vec![at(20, 0), at(29, 0), at(40, 0)];
        assert_eq!(pick_closest(anchor, &stamps), Some(1));
    }

    #[test]
    fn test_pick_closest_equidistant_prefers_later() {
        let anchor = at(30, 0);
        // 5 minutes before and 5 minutes after
        let stamps = vec![at(25, 0), at(35, 0)];
        assert_eq!(pick_closest(anchor, &stamps), Some(1));
    }

    #[test]
    fn test_pick_closest_empty() {
        assert_eq!(pick_closest(at(30, 0), &[]), None);
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(CorrelationStatus::None.as_str(), "none");
        assert_eq!(CorrelationStatus::Pending.as_str(), "pending");
        assert_eq!(CorrelationStatus::Confirmed.as_str(), "confirmed");
    }
}
