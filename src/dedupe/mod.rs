mod semantic;
mod simple;

pub use semantic::SemanticDeduplicator;
pub use simple::SimpleDeduplicator;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::{Embedder, OpenAiClient};
use crate::config::{DeduplicatorKind, ProcessingConfig, Secrets};
use crate::db::EmbeddingCache;
use crate::models::RawItem;

/// Removes repeated stories across feeds, keeping the first occurrence.
#[async_trait]
pub trait Deduplicator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deduplicate(&self, items: Vec<RawItem>) -> Vec<RawItem>;
}

/// Build the configured deduplicator. Semantic dedupe needs an API key and a
/// writable cache; without either it falls back to the simple one.
pub async fn build(
    processing: &ProcessingConfig,
    secrets: &Secrets,
    output_dir: &Path,
) -> Box<dyn Deduplicator> {
    if processing.deduplicator != DeduplicatorKind::Semantic {
        return Box::new(SimpleDeduplicator);
    }

    let client = match OpenAiClient::new(secrets.openai_api_key.clone(), processing) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Semantic dedupe unavailable, using simple dedupe: {}", e);
            return Box::new(SimpleDeduplicator);
        }
    };
    let embedder: Arc<dyn Embedder> = Arc::new(client);

    let cache_path = output_dir.join("embeddings.db");
    let cache = match EmbeddingCache::open(&cache_path, embedder.model_name()).await {
        Ok(cache) => Some(cache),
        Err(e) => {
            tracing::warn!("Embedding cache unavailable at {}: {}", cache_path.display(), e);
            None
        }
    };

    tracing::info!(
        "Using semantic dedupe ({}, threshold {})",
        embedder.model_name(),
        processing.similarity_threshold
    );
    Box::new(SemanticDeduplicator::new(
        embedder,
        cache,
        processing.similarity_threshold,
        processing.embedding_cache_days,
    ))
}
