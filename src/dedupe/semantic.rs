use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::Deduplicator;
use crate::ai::Embedder;
use crate::db::EmbeddingCache;
use crate::error::Result;
use crate::models::RawItem;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn prefix(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// Cache key: SHA-256 of the title and the first 500 characters of content.
pub fn cache_key(item: &RawItem) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", item.title, prefix(&item.content, 500)).as_bytes());
    hex::encode(hasher.finalize())
}

fn embedding_input(item: &RawItem) -> String {
    format!("{}. {}", item.title, prefix(&item.content, 1000))
}

/// Rejects items whose embedding is too close to one already accepted.
pub struct SemanticDeduplicator {
    embedder: Arc<dyn Embedder>,
    cache: Option<EmbeddingCache>,
    threshold: f32,
    cache_days: i64,
}

impl SemanticDeduplicator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        cache: Option<EmbeddingCache>,
        threshold: f32,
        cache_days: i64,
    ) -> Self {
        Self {
            embedder,
            cache,
            threshold,
            cache_days,
        }
    }

    async fn embedding_for(&self, item: &RawItem) -> Result<Vec<f32>> {
        let key = cache_key(item);

        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(vector)) => return Ok(vector),
                Ok(None) => {}
                Err(e) => tracing::debug!("Embedding cache read failed: {}", e),
            }
        }

        let vector = self.embedder.embed(&embedding_input(item)).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, &item.title, &item.url, &vector).await {
                tracing::debug!("Embedding cache write failed: {}", e);
            }
        }
        Ok(vector)
    }

    pub async fn filter(&self, items: Vec<RawItem>) -> Result<Vec<RawItem>> {
        if let Some(cache) = &self.cache {
            let removed = cache.purge_older_than(self.cache_days).await?;
            if removed > 0 {
                tracing::info!("Cleaned {} old cache entries", removed);
            }
        }

        let total = items.len();
        let mut accepted: Vec<(RawItem, Vec<f32>)> = Vec::with_capacity(total);

        for item in items {
            let vector = self.embedding_for(&item).await?;

            let closest = accepted
                .iter()
                .map(|(seen, v)| (seen, cosine_similarity(&vector, v)))
                .max_by(|a, b| a.1.total_cmp(&b.1));

            match closest {
                Some((seen, similarity)) if similarity >= self.threshold => {
                    tracing::info!(
                        "Duplicate detected (sim={:.3}): '{}' ~ '{}'",
                        similarity,
                        item.title,
                        seen.title
                    );
                }
                _ => accepted.push((item, vector)),
            }
        }

        tracing::info!("Semantic dedupe: {} -> {} items", total, accepted.len());
        if let Some(cache) = &self.cache {
            match cache.count().await {
                Ok(n) => tracing::debug!("Embedding cache holds {} entries", n),
                Err(e) => tracing::debug!("Could not count cache entries: {}", e),
            }
        }
        Ok(accepted.into_iter().map(|(item, _)| item).collect())
    }
}

#[async_trait]
impl Deduplicator for SemanticDeduplicator {
    fn name(&self) -> &'static str {
        "semantic"
    }

    async fn deduplicate(&self, items: Vec<RawItem>) -> Vec<RawItem> {
        match self.filter(items.clone()).await {
            Ok(unique) => unique,
            Err(e) => {
                tracing::warn!("Semantic dedupe failed, using simple dedupe: {}", e);
                super::SimpleDeduplicator.filter(items)
            }
        }
    }
}
