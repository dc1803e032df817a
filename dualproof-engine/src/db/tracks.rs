//! Track catalog access
//!
//! The catalog is owned by an external collaborator; the engine reads it
//! for scoring and seeds it in tests.

use dualproof_common::db::models::{blob_to_embedding, embedding_to_blob, Track};
use dualproof_common::{time, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

/// Save a track to the catalog
pub async fn save_track(pool: &SqlitePool, track: &Track) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracks (id, title, artist, embedding, storage_path, chain_tx, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(track.id.to_string())
    .bind(&track.title)
    .bind(&track.artist)
    .bind(track.embedding.as_deref().map(embedding_to_blob))
    .bind(&track.storage_path)
    .bind(&track.chain_tx)
    .bind(time::to_db(track.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a track by id
pub async fn load_track(pool: &SqlitePool, id: Uuid) -> Result<Option<Track>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, artist, embedding, storage_path, chain_tx, created_at
        FROM tracks
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id_str: String = row.get("id");
            let embedding: Option<Vec<u8>> = row.get("embedding");
            let created_at: String = row.get("created_at");

            Ok(Some(Track {
                id: parse_uuid(&id_str)?,
                title: row.get("title"),
                artist: row.get("artist"),
                embedding: embedding.as_deref().map(blob_to_embedding).transpose()?,
                storage_path: row.get("storage_path"),
                chain_tx: row.get("chain_tx"),
                created_at: time::from_db(&created_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Load all fingerprinted catalog entries for similarity scoring
///
/// Tracks without an embedding are skipped; they cannot be matched yet.
pub async fn load_catalog_embeddings(pool: &SqlitePool) -> Result<Vec<(Uuid, Vec<f32>)>> {
    let rows = sqlx::query(
        r#"
        SELECT id, embedding
        FROM tracks
        WHERE embedding IS NOT NULL
        ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut catalog = Vec::with_capacity(rows.len());
    for row in rows {
        let id_str: String = row.get("id");
        let blob: Vec<u8> = row.get("embedding");
        catalog.push((parse_uuid(&id_str)?, blob_to_embedding(&blob)?));
    }
    Ok(catalog)
}

/// Attach an embedding to an existing track
pub async fn set_track_embedding(pool: &SqlitePool, id: Uuid, embedding: &[f32]) -> Result<()> {
    sqlx::query("UPDATE tracks SET embedding = ? WHERE id = ?")
        .bind(embedding_to_blob(embedding))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
