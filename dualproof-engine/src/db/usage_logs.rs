//! Partner usage log access
//!
//! Usage logs arrive from partner integrations in no guaranteed order
//! relative to results. Raw prompts are hashed before persistence; the
//! stored record only ever sees the digest.

use chrono::{DateTime, Utc};
use dualproof_common::db::models::UsageLog;
use dualproof_common::{time, Error, Result};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

/// SHA-256 hex digest of a generation prompt
pub fn hash_prompt(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Record a partner-reported usage event
///
/// The prompt is hashed here so callers cannot accidentally persist it.
/// Confidence outside [0, 1] is rejected.
pub async fn record_usage_log(
    pool: &SqlitePool,
    track_id: Uuid,
    model_id: &str,
    prompt: Option<&str>,
    confidence: Option<f32>,
) -> Result<UsageLog> {
    if let Some(c) = confidence {
        if !(0.0..=1.0).contains(&c) || c.is_nan() {
            return Err(Error::InvalidInput(format!(
                "Confidence out of range: {}",
                c
            )));
        }
    }

    let log = UsageLog {
        id: Uuid::new_v4(),
        track_id,
        model_id: model_id.to_string(),
        prompt_hash: prompt.map(hash_prompt),
        confidence,
        result_id: None,
        created_at: time::now(),
    };

    save_usage_log(pool, &log).await?;
    Ok(log)
}

/// Save a usage log row as-is (tests use this to control timestamps)
pub async fn save_usage_log(pool: &SqlitePool, log: &UsageLog) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO usage_logs (id, track_id, model_id, prompt_hash, confidence, result_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(log.id.to_string())
    .bind(log.track_id.to_string())
    .bind(&log.model_id)
    .bind(&log.prompt_hash)
    .bind(log.confidence.map(|c| c as f64))
    .bind(log.result_id.map(|id| id.to_string()))
    .bind(time::to_db(log.created_at))
    .execute(pool)
    .await?;
    Ok(())
}

/// Load a usage log by id
pub async fn load_usage_log(pool: &SqlitePool, id: Uuid) -> Result<Option<UsageLog>> {
    let row = sqlx::query(
        r#"
        SELECT id, track_id, model_id, prompt_hash, confidence, result_id, created_at
        FROM usage_logs
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(row_to_log(&row)?)),
        None => Ok(None),
    }
}

/// Find usage logs for a track inside `[from, to]` (inclusive bounds)
pub async fn find_for_track_in_window(
    pool: &SqlitePool,
    track_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<UsageLog>> {
    let rows = sqlx::query(
        r#"
        SELECT id, track_id, model_id, prompt_hash, confidence, result_id, created_at
        FROM usage_logs
        WHERE track_id = ?
          AND created_at >= ?
          AND created_at <= ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(track_id.to_string())
    .bind(time::to_db(from))
    .bind(time::to_db(to))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_log).collect()
}

/// Attach the correlated result to a usage log (idempotent; an already
/// attached log keeps its original reference)
pub async fn attach_result(pool: &SqlitePool, log_id: Uuid, result_id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE usage_logs SET result_id = ? WHERE id = ? AND result_id IS NULL",
    )
    .bind(result_id.to_string())
    .bind(log_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

fn row_to_log(row: &sqlx::sqlite::SqliteRow) -> Result<UsageLog> {
    let id_str: String = row.get("id");
    let track_id_str: String = row.get("track_id");
    let result_id_str: Option<String> = row.get("result_id");
    let confidence: Option<f64> = row.get("confidence");
    let created_at: String = row.get("created_at");

    Ok(UsageLog {
        id: parse_uuid(&id_str)?,
        track_id: parse_uuid(&track_id_str)?,
        model_id: row.get("model_id"),
        prompt_hash: row.get("prompt_hash"),
        confidence: confidence.map(|c| c as f32),
        result_id: result_id_str.as_deref().map(parse_uuid).transpose()?,
        created_at: time::from_db(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_prompt_is_sha256_hex() {
        let digest = hash_prompt("lofi beats in the style of");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic
        assert_eq!(digest, hash_prompt("lofi beats in the style of"));
        assert_ne!(digest, hash_prompt("different prompt"));
    }
}
