//! Probe scoring against the track catalog
//!
//! Ties the embedder and similarity ranking together and persists the
//! resulting ranked match list as one attribution result.

use crate::db::{results, tracks};
use crate::error::{EngineError, EngineResult};
use crate::services::embedder::Embedder;
use crate::services::policy::AttributionPolicy;
use crate::services::similarity::{build_matches, rank_matches};
use dualproof_common::db::models::AttributionResult;
use dualproof_common::{time, EngineConfig};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Scores probes against the catalog and records results
pub struct Scorer {
    db: SqlitePool,
    embedder: Embedder,
    policy: AttributionPolicy,
    top_n: usize,
}

impl Scorer {
    pub fn new(db: SqlitePool, config: &EngineConfig) -> EngineResult<Self> {
        Ok(Self {
            db,
            embedder: Embedder::new(config)?,
            policy: AttributionPolicy::new(config),
            top_n: config.top_n_matches,
        })
    }

    /// Embed a probe file and score it against every fingerprinted catalog
    /// track. Returns `None` when the catalog holds nothing to match.
    pub async fn score_file(&self, path: &Path) -> EngineResult<Option<AttributionResult>> {
        let probe = self.embedder.embed_file(path)?;
        self.score_embedding(&probe, Some(path.display().to_string()))
            .await
    }

    /// Score a pre-computed probe embedding and persist the result
    pub async fn score_embedding(
        &self,
        probe: &[f32],
        source_path: Option<String>,
    ) -> EngineResult<Option<AttributionResult>> {
        if probe.len() != self.embedder.dim() {
            return Err(EngineError::InvalidInput(format!(
                "Probe dimension {} does not match catalog dimension {}",
                probe.len(),
                self.embedder.dim()
            )));
        }

        let catalog = tracks::load_catalog_embeddings(&self.db).await?;
        let ranked = rank_matches(probe, &catalog, self.top_n)?;
        if ranked.is_empty() {
            info!("Probe scored against an empty catalog; no result recorded");
            return Ok(None);
        }

        let matches = build_matches(&ranked);
        let result = AttributionResult {
            id: Uuid::new_v4(),
            track_id: matches[0].track_id,
            source_path,
            matches,
            created_at: time::now(),
        };

        results::save_result(&self.db, &result).await?;

        // Policy runs once per result at creation time
        let decision = self.policy.evaluate(&result.matches);
        info!(
            result_id = %result.id,
            top_track = %result.track_id,
            top_similarity = result.top_similarity(),
            matches = result.matches.len(),
            payable = decision.payable,
            "Attribution result recorded"
        );

        Ok(Some(result))
    }
}
