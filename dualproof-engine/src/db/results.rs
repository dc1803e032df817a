//! Attribution result persistence
//!
//! A result and its ranked matches are written in one transaction; a
//! result with half its match list is never observable.

use chrono::{DateTime, Utc};
use dualproof_common::db::models::{AttributionMatch, AttributionResult};
use dualproof_common::{time, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

/// One result that falls inside a correlation window for some track,
/// with the similarity of its match on that track
#[derive(Debug, Clone)]
pub struct ResultWindowRow {
    pub result_id: Uuid,
    pub similarity: f32,
    pub created_at: DateTime<Utc>,
}

/// Save a result and its ranked match list atomically
pub async fn save_result(pool: &SqlitePool, result: &AttributionResult) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO results (id, track_id, source_path, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(result.id.to_string())
    .bind(result.track_id.to_string())
    .bind(&result.source_path)
    .bind(time::to_db(result.created_at))
    .execute(&mut *tx)
    .await?;

    for (rank, m) in result.matches.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO result_matches (result_id, track_id, rank, similarity, influence_share)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.id.to_string())
        .bind(m.track_id.to_string())
        .bind(rank as i64)
        .bind(m.similarity as f64)
        .bind(m.influence_share as f64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Load a result with its ranked match list
pub async fn load_result(pool: &SqlitePool, id: Uuid) -> Result<Option<AttributionResult>> {
    let row = sqlx::query(
        r#"
        SELECT id, track_id, source_path, created_at
        FROM results
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id_str: String = row.get("id");
    let track_id_str: String = row.get("track_id");
    let created_at: String = row.get("created_at");

    let match_rows = sqlx::query(
        r#"
        SELECT track_id, similarity, influence_share
        FROM result_matches
        WHERE result_id = ?
        ORDER BY rank
        "#,
    )
    .bind(id.to_string())
    .fetch_all(pool)
    .await?;

    let mut matches = Vec::with_capacity(match_rows.len());
    for m in match_rows {
        let match_track: String = m.get("track_id");
        let similarity: f64 = m.get("similarity");
        let influence_share: f64 = m.get("influence_share");
        matches.push(AttributionMatch {
            track_id: parse_uuid(&match_track)?,
            similarity: similarity as f32,
            influence_share: influence_share as f32,
        });
    }

    Ok(Some(AttributionResult {
        id: parse_uuid(&id_str)?,
        track_id: parse_uuid(&track_id_str)?,
        source_path: row.get("source_path"),
        matches,
        created_at: time::from_db(&created_at)?,
    }))
}

/// Find results with a match on `track_id` at or above `min_similarity`,
/// timestamped inside `[from, to]` (inclusive on both bounds)
pub async fn find_for_track_in_window(
    pool: &SqlitePool,
    track_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    min_similarity: f32,
) -> Result<Vec<ResultWindowRow>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.created_at, m.similarity
        FROM results r
        JOIN result_matches m ON m.result_id = r.id
        WHERE m.track_id = ?
          AND m.similarity >= ?
          AND r.created_at >= ?
          AND r.created_at <= ?
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(track_id.to_string())
    .bind(min_similarity as f64)
    .bind(time::to_db(from))
    .bind(time::to_db(to))
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id_str: String = row.get("id");
        let created_at: String = row.get("created_at");
        let similarity: f64 = row.get("similarity");
        out.push(ResultWindowRow {
            result_id: parse_uuid(&id_str)?,
            similarity: similarity as f32,
            created_at: time::from_db(&created_at)?,
        });
    }
    Ok(out)
}

/// Find recent result ids whose top similarity clears `min_similarity` and
/// which have no royalty event yet (the auditor sweep work list)
pub async fn find_unprocessed_since(
    pool: &SqlitePool,
    since: DateTime<Utc>,
    min_similarity: f32,
    limit: i64,
) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id
        FROM results r
        WHERE r.created_at >= ?
          AND EXISTS (
              SELECT 1 FROM result_matches m
              WHERE m.result_id = r.id AND m.similarity >= ?
          )
          AND NOT EXISTS (
              SELECT 1 FROM royalty_events e WHERE e.result_id = r.id
          )
        ORDER BY r.created_at DESC
        LIMIT ?
        "#,
    )
    .bind(time::to_db(since))
    .bind(min_similarity as f64)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut ids = Vec::with_capacity(rows.len());
    for row in rows {
        let id_str: String = row.get("id");
        ids.push(parse_uuid(&id_str)?);
    }
    Ok(ids)
}
