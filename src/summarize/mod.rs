mod llm;
mod truncation;

pub use llm::LlmSummarizer;
pub use truncation::TruncationSummarizer;

use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::OpenAiClient;
use crate::config::{ProcessingConfig, Secrets, SummarizerKind};
use crate::error::Result;
use crate::feed::ContentCleaner;
use crate::models::{ProcessedItem, RawItem};
use crate::policy::{PolicyGuard, PreLlmChecker};

/// Turns a raw item into a spoken script. Failures come back as skipped items.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summarize(&self, item: &RawItem) -> ProcessedItem;
}

/// Build the configured summarizer, falling back to truncation when the LLM
/// client cannot be set up.
pub fn build(processing: &ProcessingConfig, secrets: &Secrets) -> Result<Box<dyn Summarizer>> {
    if processing.summarizer == SummarizerKind::Openai {
        match OpenAiClient::new(secrets.openai_api_key.clone(), processing) {
            Ok(client) => {
                tracing::info!("Using OpenAI summarizer ({})", processing.openai_model);
                return Ok(Box::new(LlmSummarizer::new(
                    Arc::new(client),
                    ContentCleaner::new(processing)?,
                    PreLlmChecker::new(processing.policy_checks.clone()),
                    PolicyGuard::new(
                        processing.policy_checks.clone(),
                        processing.max_words,
                        processing.max_quote_words,
                    ),
                    processing.max_words,
                    processing.max_quote_words,
                )));
            }
            Err(e) => tracing::warn!("OpenAI summarizer unavailable, using simple summarizer: {}", e),
        }
    }

    Ok(Box::new(TruncationSummarizer::new(processing.max_words)))
}

/// Summarize items one at a time and drop the ones that were skipped.
pub async fn summarize_all(summarizer: &dyn Summarizer, items: &[RawItem]) -> Vec<ProcessedItem> {
    let mut processed = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for item in items {
        let result = summarizer.summarize(item).await;
        if result.is_skipped() {
            tracing::info!(
                "Skipping '{}': {}",
                item.title,
                result.skip_reason().unwrap_or("no reason given")
            );
            skipped += 1;
        } else {
            processed.push(result);
        }
    }

    tracing::info!(
        "Summarized {} items with {} ({} skipped)",
        processed.len(),
        summarizer.name(),
        skipped
    );
    processed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_without_key_falls_back_to_simple() {
        let processing = ProcessingConfig {
            summarizer: SummarizerKind::Openai,
            ..ProcessingConfig::default()
        };
        let summarizer = build(&processing, &Secrets::default()).unwrap();
        assert_eq!(summarizer.name(), "simple");
    }

    #[test]
    fn openai_with_key_is_used() {
        let processing = ProcessingConfig {
            summarizer: SummarizerKind::Openai,
            ..ProcessingConfig::default()
        };
        let secrets = Secrets {
            openai_api_key: Some("sk-test".into()),
            ..Secrets::default()
        };
        assert_eq!(build(&processing, &secrets).unwrap().name(), "openai");
    }

    #[tokio::test]
    async fn skipped_items_are_dropped() {
        let items = vec![
            RawItem {
                title: "Has text".into(),
                url: "https://example.com/a".into(),
                content: "Plenty of words here".into(),
                published: None,
                source_name: "S".into(),
            },
            RawItem {
                title: "Empty".into(),
                url: "https://example.com/b".into(),
                content: String::new(),
                published: None,
                source_name: "S".into(),
            },
        ];
        let processed = summarize_all(&TruncationSummarizer::new(50), &items).await;
        // The truncation summarizer never skips, even for empty bodies.
        assert_eq!(processed.len(), 2);
        assert_eq!(processed[1].word_count, 0);
    }
}
