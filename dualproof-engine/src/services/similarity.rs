//! Similarity scoring over embedding vectors
//!
//! Similarity is cosine similarity clamped to [0, 1]. One convention holds
//! for the whole engine: stored match rows, correlation thresholds, and
//! policy inputs all see the clamped value. Negative cosine carries no
//! attribution signal.

use crate::error::{EngineError, EngineResult};
use dualproof_common::db::models::AttributionMatch;
use uuid::Uuid;

/// One catalog track scored against a probe
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTrack {
    pub track_id: Uuid,
    pub similarity: f32,
}

/// Cosine similarity between two vectors, clamped to [0, 1]
///
/// Defined as dot / (|a| * |b|); `0.0` when either norm is zero, so an
/// unfingerprinted or silent signal can never produce NaN or a panic.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> EngineResult<f32> {
    if a.len() != b.len() {
        return Err(EngineError::InvalidInput(format!(
            "Vector dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as f64 * y as f64;
        norm_a += x as f64 * x as f64;
        norm_b += y as f64 * y as f64;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(cosine.clamp(0.0, 1.0) as f32)
}

/// Score a probe against the catalog, descending by similarity,
/// truncated to `top_n`. Ties keep catalog order.
pub fn rank_matches(
    probe: &[f32],
    catalog: &[(Uuid, Vec<f32>)],
    top_n: usize,
) -> EngineResult<Vec<ScoredTrack>> {
    let mut scored = Vec::with_capacity(catalog.len());
    for (track_id, embedding) in catalog {
        scored.push(ScoredTrack {
            track_id: *track_id,
            similarity: cosine_similarity(probe, embedding)?,
        });
    }

    // Stable sort keeps catalog order for equal similarities
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_n);
    Ok(scored)
}

/// Normalize similarities into influence shares summing to 1.0
///
/// An all-zero list yields all-zero shares: no signal, no attribution
/// credit.
pub fn influence_shares(similarities: &[f32]) -> Vec<f32> {
    let total: f32 = similarities.iter().sum();
    if total <= 0.0 {
        return vec![0.0; similarities.len()];
    }
    similarities.iter().map(|s| s / total).collect()
}

/// Combine ranked tracks and their shares into persisted match rows
pub fn build_matches(ranked: &[ScoredTrack]) -> Vec<AttributionMatch> {
    let shares = influence_shares(&ranked.iter().map(|s| s.similarity).collect::<Vec<_>>());
    ranked
        .iter()
        .zip(shares)
        .map(|(scored, influence_share)| AttributionMatch {
            track_id: scored.track_id,
            similarity: scored.similarity,
            influence_share,
        })
        .collect()
}
