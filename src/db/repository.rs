use std::path::Path;

use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::error::Result;

use super::schema::SCHEMA;

/// SQLite-backed store of item embeddings keyed by content hash and model.
pub struct EmbeddingCache {
    conn: Connection,
    model: String,
}

impl EmbeddingCache {
    pub async fn open(db_path: &Path, model: &str) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path).await?;
        Self::init(conn, model).await
    }

    #[cfg(test)]
    pub async fn open_in_memory(model: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, model).await
    }

    async fn init(conn: Connection, model: &str) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            model: model.to_string(),
        })
    }

    /// Drop entries older than `days` days. Returns how many were removed.
    pub async fn purge_older_than(&self, days: i64) -> Result<usize> {
        let modifier = format!("-{} days", days.max(0));
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM embeddings WHERE created_at < datetime('now', ?1)",
                    params![modifier],
                )?;
                Ok(n)
            })
            .await?;
        Ok(removed)
    }

    /// Cached vector for `key`, if it was computed with the same model.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<f32>>> {
        let key = key.to_string();
        let model = self.model.clone();
        let blob = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT vector FROM embeddings WHERE cache_key = ?1 AND model = ?2",
                )?;
                let blob = stmt
                    .query_row(params![key, model], |row| row.get::<_, Vec<u8>>(0))
                    .optional()?;
                Ok(blob)
            })
            .await?;
        Ok(blob.map(|b| decode_vector(&b)))
    }

    pub async fn put(&self, key: &str, title: &str, url: &str, vector: &[f32]) -> Result<()> {
        let key = key.to_string();
        let model = self.model.clone();
        let title = title.to_string();
        let url = url.to_string();
        let blob = encode_vector(vector);
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO embeddings (cache_key, model, title, url, vector)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(cache_key, model) DO UPDATE SET
                           title = excluded.title,
                           url = excluded.url,
                           vector = excluded.vector,
                           created_at = datetime('now')"#,
                    params![key, model, title, url, blob],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Entries stored for this cache's model.
    pub async fn count(&self) -> Result<usize> {
        let model = self.model.clone();
        let count = self
            .conn
            .call(move |conn| {
                let n: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM embeddings WHERE model = ?1",
                    params![model],
                    |row| row.get(0),
                )?;
                Ok(n)
            })
            .await?;
        Ok(count as usize)
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vectors_round_trip_per_model() {
        let cache = EmbeddingCache::open_in_memory("text-embedding-3-small").await.unwrap();
        cache
            .put("k1", "Title", "https://example.com", &[0.25, -1.5, 3.0])
            .await
            .unwrap();

        assert_eq!(cache.get("k1").await.unwrap(), Some(vec![0.25, -1.5, 3.0]));
        assert_eq!(cache.get("missing").await.unwrap(), None);
        assert_eq!(cache.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn old_entries_are_purged() {
        let cache = EmbeddingCache::open_in_memory("m").await.unwrap();
        cache.put("fresh", "a", "u", &[1.0]).await.unwrap();
        cache.put("stale", "b", "u", &[2.0]).await.unwrap();
        cache
            .conn
            .call(|conn| {
                conn.execute(
                    "UPDATE embeddings SET created_at = datetime('now', '-30 days') WHERE cache_key = 'stale'",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(cache.purge_older_than(7).await.unwrap(), 1);
        assert!(cache.get("stale").await.unwrap().is_none());
        assert!(cache.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cache_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("embeddings.db");
        {
            let cache = EmbeddingCache::open(&path, "m").await.unwrap();
            cache.put("k", "t", "u", &[0.5]).await.unwrap();
        }
        let reopened = EmbeddingCache::open(&path, "m").await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some(vec![0.5]));

        let other_model = EmbeddingCache::open(&path, "other").await.unwrap();
        assert!(other_model.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn models_keep_separate_rows_for_the_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.db");
        let small = EmbeddingCache::open(&path, "small").await.unwrap();
        let large = EmbeddingCache::open(&path, "large").await.unwrap();

        small.put("k", "t", "u", &[1.0]).await.unwrap();
        large.put("k", "t", "u", &[2.0, 3.0]).await.unwrap();

        assert_eq!(small.get("k").await.unwrap(), Some(vec![1.0]));
        assert_eq!(large.get("k").await.unwrap(), Some(vec![2.0, 3.0]));
        assert_eq!(small.count().await.unwrap(), 1);
    }
}
