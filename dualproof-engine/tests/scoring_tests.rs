//! Integration tests for probe scoring
//!
//! Builds a small fingerprinted catalog from synthetic tones, writes a
//! probe WAV with hound, and runs the decode -> embed -> rank -> persist
//! path end to end.

mod helpers;

use dualproof_engine::db::results;
use dualproof_engine::services::audio_decoder::DecodedAudio;
use dualproof_engine::{AttributionPolicy, Embedder, EngineError, Scorer};
use helpers::*;
use std::path::Path;
use tempfile::TempDir;

const SAMPLE_RATE: u32 = 22_050;

fn sine_samples(freq: f32, seconds: f32) -> Vec<f32> {
    let total = (SAMPLE_RATE as f32 * seconds) as usize;
    (0..total)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin() * 0.5)
        .collect()
}

fn sine_embedding(embedder: &Embedder, freq: f32) -> Vec<f32> {
    let samples = sine_samples(freq, 3.0);
    let audio = DecodedAudio {
        duration_seconds: samples.len() as f64 / SAMPLE_RATE as f64,
        samples,
        sample_rate: SAMPLE_RATE,
        channels: 1,
    };
    embedder.embed(&audio).unwrap()
}

fn write_sine_wav(path: &Path, freq: f32, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for sample in sine_samples(freq, seconds) {
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[tokio::test]
async fn test_probe_matches_closest_catalog_track() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    let config = test_config();
    let embedder = Embedder::new(&config).unwrap();

    let near = seed_track(&pool, Some(sine_embedding(&embedder, 440.0))).await;
    let far = seed_track(&pool, Some(sine_embedding(&embedder, 3_000.0))).await;

    let probe_path = dir.path().join("probe.wav");
    write_sine_wav(&probe_path, 440.0, 3.0);

    let scorer = Scorer::new(pool.clone(), &config).unwrap();
    let result = scorer.score_file(&probe_path).await.unwrap().unwrap();

    assert_eq!(result.track_id, near.id, "same tone should rank first");
    assert_eq!(result.matches.len(), 2);
    assert_eq!(result.matches[1].track_id, far.id);
    assert!(result.matches[0].similarity > result.matches[1].similarity);
    assert!(
        result.matches[0].similarity > 0.99,
        "identical tone should score near 1.0, got {}",
        result.matches[0].similarity
    );

    // Influence shares sum to 1
    let share_total: f32 = result.matches.iter().map(|m| m.influence_share).sum();
    assert!((share_total - 1.0).abs() < 1e-5);

    // The result round-trips through storage with its ranked matches
    let stored = results::load_result(&pool, result.id).await.unwrap().unwrap();
    assert_eq!(stored.matches.len(), 2);
    assert_eq!(stored.matches[0].track_id, near.id);
}

#[tokio::test]
async fn test_scoring_feeds_policy_gate() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    let config = test_config();
    let embedder = Embedder::new(&config).unwrap();

    seed_track(&pool, Some(sine_embedding(&embedder, 440.0))).await;

    let probe_path = dir.path().join("probe.wav");
    write_sine_wav(&probe_path, 440.0, 3.0);

    let scorer = Scorer::new(pool, &config).unwrap();
    let result = scorer.score_file(&probe_path).await.unwrap().unwrap();

    // An exact-tone replica clears both payability thresholds
    let policy = AttributionPolicy::new(&config);
    assert!(policy.is_payable(&result.matches));
}

#[tokio::test]
async fn test_empty_catalog_records_nothing() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    let config = test_config();

    let probe_path = dir.path().join("probe.wav");
    write_sine_wav(&probe_path, 440.0, 2.0);

    let scorer = Scorer::new(pool.clone(), &config).unwrap();
    let result = scorer.score_file(&probe_path).await.unwrap();
    assert!(result.is_none());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_probe_dimension_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    let config = test_config();

    let scorer = Scorer::new(pool, &config).unwrap();
    let wrong_dim = vec![0.5f32; 16];
    assert!(matches!(
        scorer.score_embedding(&wrong_dim, None).await,
        Err(EngineError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_unreadable_probe_rejected() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    let config = test_config();

    let bogus = dir.path().join("not_audio.wav");
    std::fs::write(&bogus, b"definitely not a wav file").unwrap();

    let scorer = Scorer::new(pool, &config).unwrap();
    assert!(matches!(
        scorer.score_file(&bogus).await,
        Err(EngineError::InvalidInput(_))
    ));
}
