//! Integration tests for the auditor sweep

mod helpers;

use chrono::Duration;
use dualproof_engine::Auditor;
use helpers::*;
use tempfile::TempDir;

#[tokio::test]
async fn test_sweep_derives_pending_pairs_once() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    let config = test_config();

    let track_a = seed_track(&pool, None).await;
    let track_b = seed_track(&pool, None).await;
    let anchor = dualproof_common::time::now();

    // Two pending pairs
    seed_single_match_result(&pool, track_a.id, 0.9, 0.8, anchor).await;
    seed_usage_log(&pool, track_a.id, Some(0.9), anchor + Duration::minutes(3)).await;
    seed_single_match_result(&pool, track_b.id, 0.88, 0.7, anchor).await;
    seed_usage_log(&pool, track_b.id, Some(0.8), anchor - Duration::minutes(2)).await;

    // High similarity but no usage log: correlates to none
    let track_c = seed_track(&pool, None).await;
    seed_single_match_result(&pool, track_c.id, 0.95, 0.9, anchor).await;

    // Below the correlation threshold: never a sweep candidate
    let track_d = seed_track(&pool, None).await;
    seed_single_match_result(&pool, track_d.id, 0.5, 0.9, anchor).await;

    let auditor = Auditor::new(pool.clone(), config.clone());
    let report = auditor.sweep().await.unwrap();

    assert_eq!(report.scanned, 3);
    assert_eq!(report.correlated, 2);
    assert_eq!(report.derived, 2);
    assert_eq!(report.skipped, 1);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM royalty_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 2);

    // Derived results drop out of the work list; nothing derives twice
    let second = auditor.sweep().await.unwrap();
    assert_eq!(second.derived, 0);
    assert_eq!(second.scanned, 1); // only the uncorrelated result remains

    let count_after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM royalty_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count_after, 2);
}

#[tokio::test]
async fn test_dry_run_derives_nothing() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    let config = test_config();

    let track = seed_track(&pool, None).await;
    let anchor = dualproof_common::time::now();
    seed_single_match_result(&pool, track.id, 0.9, 0.8, anchor).await;
    seed_usage_log(&pool, track.id, None, anchor).await;

    let auditor = Auditor::new(pool.clone(), config).with_dry_run(true);
    let report = auditor.sweep().await.unwrap();

    assert_eq!(report.correlated, 1);
    assert_eq!(report.derived, 0);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM royalty_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_sweep_respects_batch_size() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    let mut config = test_config();
    config.batch_size = 1;

    let track = seed_track(&pool, None).await;
    let anchor = dualproof_common::time::now();
    for offset in 0..3 {
        seed_single_match_result(
            &pool,
            track.id,
            0.9,
            0.8,
            anchor - Duration::minutes(offset),
        )
        .await;
    }

    let auditor = Auditor::new(pool, config);
    let report = auditor.sweep().await.unwrap();
    assert_eq!(report.scanned, 1);
}

#[tokio::test]
async fn test_sweep_ignores_results_outside_time_window() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    let config = test_config();

    let track = seed_track(&pool, None).await;
    let stale = dualproof_common::time::now() - config.time_window() - Duration::hours(1);
    seed_single_match_result(&pool, track.id, 0.9, 0.8, stale).await;
    seed_usage_log(&pool, track.id, None, stale).await;

    let auditor = Auditor::new(pool, config);
    let report = auditor.sweep().await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(report.derived, 0);
}
