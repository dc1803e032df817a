//! Database models
//!
//! Record shapes shared between the engine and its collaborators. The
//! catalog, partner integration, and payout pipeline all speak these types;
//! the engine itself only reads tracks and usage logs, and owns results and
//! royalty events.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    /// Fixed-length feature vector; absent until the track is fingerprinted
    pub embedding: Option<Vec<f32>>,
    pub storage_path: Option<String>,
    /// On-chain transaction reference (written by an external collaborator)
    pub chain_tx: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Track {
    /// Create a new catalog entry
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: artist.into(),
            embedding: None,
            storage_path: None,
            chain_tx: None,
            created_at: crate::time::now(),
        }
    }
}

/// One scored comparison between a probe and one catalog track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionMatch {
    pub track_id: Uuid,
    /// Cosine similarity clamped to [0, 1]
    pub similarity: f32,
    /// Fraction of attribution credit; non-negative, sums to <= 1 per result
    pub influence_share: f32,
}

/// Ranked match list for one scored probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionResult {
    pub id: Uuid,
    /// Top-ranked match; the track this result is filed under
    pub track_id: Uuid,
    pub source_path: Option<String>,
    /// Descending by similarity, truncated to top-N
    pub matches: Vec<AttributionMatch>,
    pub created_at: DateTime<Utc>,
}

impl AttributionResult {
    /// Similarity of the match for `track_id`, if the result has one
    pub fn similarity_for(&self, track_id: Uuid) -> Option<f32> {
        self.matches
            .iter()
            .find(|m| m.track_id == track_id)
            .map(|m| m.similarity)
    }

    /// Top-match similarity (0.0 for an empty match list)
    pub fn top_similarity(&self) -> f32 {
        self.matches.first().map(|m| m.similarity).unwrap_or(0.0)
    }
}

/// Partner-reported usage event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLog {
    pub id: Uuid,
    pub track_id: Uuid,
    pub model_id: String,
    /// SHA-256 hex of the generation prompt; raw prompts are never stored
    pub prompt_hash: Option<String>,
    /// Partner self-reported confidence in [0, 1]
    pub confidence: Option<f32>,
    /// Attached once a derivation links this log to a result
    pub result_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Royalty event lifecycle status
///
/// `pending -> approved -> paid`, or `disputed`. Owned by the payout
/// collaborator after creation; the financial fields never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoyaltyStatus {
    Pending,
    Approved,
    Paid,
    Disputed,
}

impl RoyaltyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoyaltyStatus::Pending => "pending",
            RoyaltyStatus::Approved => "approved",
            RoyaltyStatus::Paid => "paid",
            RoyaltyStatus::Disputed => "disputed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RoyaltyStatus::Pending),
            "approved" => Ok(RoyaltyStatus::Approved),
            "paid" => Ok(RoyaltyStatus::Paid),
            "disputed" => Ok(RoyaltyStatus::Disputed),
            other => Err(Error::InvalidInput(format!(
                "Unknown royalty status '{}'",
                other
            ))),
        }
    }
}

/// Derived royalty record; exactly one per (track, result) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoyaltyEvent {
    pub id: Uuid,
    pub track_id: Uuid,
    pub result_id: Uuid,
    pub usage_log_id: Option<Uuid>,
    pub similarity: f32,
    /// Influence share the payout was computed from
    pub payout_weight: f32,
    pub amount_cents: i64,
    pub status: RoyaltyStatus,
    pub verified_at: DateTime<Utc>,
}

/// Encode an embedding as little-endian f32 bytes for BLOB storage
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode a stored BLOB back into an embedding vector
pub fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::InvalidInput(format!(
            "Embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_roundtrip() {
        let embedding = vec![0.0f32, 1.5, -2.25, 1e-7];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_embedding(&blob).unwrap(), embedding);
    }

    #[test]
    fn test_blob_bad_length_rejected() {
        assert!(blob_to_embedding(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_royalty_status_roundtrip() {
        for status in [
            RoyaltyStatus::Pending,
            RoyaltyStatus::Approved,
            RoyaltyStatus::Paid,
            RoyaltyStatus::Disputed,
        ] {
            assert_eq!(RoyaltyStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(RoyaltyStatus::parse("reversed").is_err());
    }

    #[test]
    fn test_result_similarity_lookup() {
        let track_a = Uuid::new_v4();
        let track_b = Uuid::new_v4();
        let result = AttributionResult {
            id: Uuid::new_v4(),
            track_id: track_a,
            source_path: None,
            matches: vec![
                AttributionMatch {
                    track_id: track_a,
                    similarity: 0.91,
                    influence_share: 0.7,
                },
                AttributionMatch {
                    track_id: track_b,
                    similarity: 0.42,
                    influence_share: 0.3,
                },
            ],
            created_at: crate::time::now(),
        };
        assert_eq!(result.similarity_for(track_a), Some(0.91));
        assert_eq!(result.similarity_for(Uuid::new_v4()), None);
        assert_eq!(result.top_similarity(), 0.91);
    }
}
