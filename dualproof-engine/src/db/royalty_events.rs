//! Royalty event persistence
//!
//! The insert path is "insert, and on conflict, re-read": the
//! UNIQUE(track_id, result_id) constraint serializes concurrent derivations
//! for the same pair, and the loser reads back the winner's row. No
//! application mutex is involved, so the guarantee holds across processes.

use dualproof_common::db::models::{RoyaltyEvent, RoyaltyStatus};
use dualproof_common::{time, Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

/// Insert a royalty event unless one already exists for its
/// (track, result) pair. Returns `true` when this call created the row.
pub async fn insert_event_once(pool: &SqlitePool, event: &RoyaltyEvent) -> Result<bool> {
    let done = sqlx::query(
        r#"
        INSERT INTO royalty_events
            (id, track_id, result_id, usage_log_id, similarity, payout_weight,
             amount_cents, status, verified_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(track_id, result_id) DO NOTHING
        "#,
    )
    .bind(event.id.to_string())
    .bind(event.track_id.to_string())
    .bind(event.result_id.to_string())
    .bind(event.usage_log_id.map(|id| id.to_string()))
    .bind(event.similarity as f64)
    .bind(event.payout_weight as f64)
    .bind(event.amount_cents)
    .bind(event.status.as_str())
    .bind(time::to_db(event.verified_at))
    .execute(pool)
    .await?;

    Ok(done.rows_affected() == 1)
}

/// Load the event for a (track, result) pair
pub async fn find_by_pair(
    pool: &SqlitePool,
    track_id: Uuid,
    result_id: Uuid,
) -> Result<Option<RoyaltyEvent>> {
    let row = sqlx::query(
        "SELECT * FROM royalty_events WHERE track_id = ? AND result_id = ?",
    )
    .bind(track_id.to_string())
    .bind(result_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_event).transpose()
}

/// Load the event referencing a usage log
pub async fn find_by_usage_log(
    pool: &SqlitePool,
    usage_log_id: Uuid,
) -> Result<Option<RoyaltyEvent>> {
    let row = sqlx::query("SELECT * FROM royalty_events WHERE usage_log_id = ?")
        .bind(usage_log_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_event).transpose()
}

/// Update lifecycle status only; the payout collaborator never touches the
/// financial fields
pub async fn update_event_status(
    pool: &SqlitePool,
    event_id: Uuid,
    status: RoyaltyStatus,
) -> Result<()> {
    let done = sqlx::query("UPDATE royalty_events SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(event_id.to_string())
        .execute(pool)
        .await?;

    if done.rows_affected() == 0 {
        return Err(Error::NotFound(format!("royalty event {}", event_id)));
    }
    Ok(())
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<RoyaltyEvent> {
    let id_str: String = row.get("id");
    let track_id_str: String = row.get("track_id");
    let result_id_str: String = row.get("result_id");
    let usage_log_id_str: Option<String> = row.get("usage_log_id");
    let similarity: f64 = row.get("similarity");
    let payout_weight: f64 = row.get("payout_weight");
    let status: String = row.get("status");
    let verified_at: String = row.get("verified_at");

    Ok(RoyaltyEvent {
        id: parse_uuid(&id_str)?,
        track_id: parse_uuid(&track_id_str)?,
        result_id: parse_uuid(&result_id_str)?,
        usage_log_id: usage_log_id_str.as_deref().map(parse_uuid).transpose()?,
        similarity: similarity as f32,
        payout_weight: payout_weight as f32,
        amount_cents: row.get("amount_cents"),
        status: RoyaltyStatus::parse(&status)?,
        verified_at: time::from_db(&verified_at)?,
    })
}
