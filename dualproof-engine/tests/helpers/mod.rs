//! Shared fixtures for engine integration tests
#![allow(dead_code)] // each test binary uses a different subset

use chrono::{DateTime, Utc};
use dualproof_common::db::init::init_database;
use dualproof_common::db::models::{AttributionMatch, AttributionResult, Track, UsageLog};
use dualproof_common::EngineConfig;
use dualproof_engine::db::{results, tracks, usage_logs};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// File-backed scratch database; keep the TempDir alive for the test
pub async fn test_pool(dir: &TempDir) -> SqlitePool {
    init_database(&dir.path().join("engine.db")).await.unwrap()
}

/// Engine defaults with a small embedding for fast tests
pub fn test_config() -> EngineConfig {
    EngineConfig {
        embedding_dim: 64,
        ..EngineConfig::default()
    }
}

/// Seed a catalog track, optionally fingerprinted
pub async fn seed_track(pool: &SqlitePool, embedding: Option<Vec<f32>>) -> Track {
    let mut track = Track::new("Echoes of You", "Josh Royal");
    track.embedding = embedding;
    tracks::save_track(pool, &track).await.unwrap();
    track
}

/// Seed a result with an explicit match list and timestamp
pub async fn seed_result(
    pool: &SqlitePool,
    matches: Vec<AttributionMatch>,
    created_at: DateTime<Utc>,
) -> AttributionResult {
    let result = AttributionResult {
        id: Uuid::new_v4(),
        track_id: matches[0].track_id,
        source_path: Some("probe.wav".to_string()),
        matches,
        created_at,
    };
    results::save_result(pool, &result).await.unwrap();
    result
}

/// Seed a single-match result for `track_id`
pub async fn seed_single_match_result(
    pool: &SqlitePool,
    track_id: Uuid,
    similarity: f32,
    influence_share: f32,
    created_at: DateTime<Utc>,
) -> AttributionResult {
    seed_result(
        pool,
        vec![AttributionMatch {
            track_id,
            similarity,
            influence_share,
        }],
        created_at,
    )
    .await
}

/// Seed a partner usage log with an explicit timestamp
pub async fn seed_usage_log(
    pool: &SqlitePool,
    track_id: Uuid,
    confidence: Option<f32>,
    created_at: DateTime<Utc>,
) -> UsageLog {
    let log = UsageLog {
        id: Uuid::new_v4(),
        track_id,
        model_id: "model-alpha".to_string(),
        prompt_hash: Some(usage_logs::hash_prompt("a dreamy synth ballad")),
        confidence,
        result_id: None,
        created_at,
    };
    usage_logs::save_usage_log(pool, &log).await.unwrap();
    log
}
