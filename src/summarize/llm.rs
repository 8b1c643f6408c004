use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::Summarizer;
use crate::ai::LanguageModel;
use crate::feed::ContentCleaner;
use crate::models::{count_words, Notes, ProcessedItem, RawItem};
use crate::policy::{PolicyGuard, PreLlmChecker};

const MAX_PROMPT_CHARS: usize = 2000;
const MAX_TOKENS: u32 = 200;

#[derive(Debug, Deserialize)]
struct SummaryReply {
    script: String,
    #[serde(rename = "type")]
    kind: String,
    key_topics: Vec<String>,
}

/// Summarizes items through a chat model, with policy checks on both sides.
pub struct LlmSummarizer {
    llm: Arc<dyn LanguageModel>,
    cleaner: ContentCleaner,
    pre_checks: PreLlmChecker,
    guard: PolicyGuard,
    max_words: usize,
    max_quote_words: usize,
}

impl LlmSummarizer {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        cleaner: ContentCleaner,
        pre_checks: PreLlmChecker,
        guard: PolicyGuard,
        max_words: usize,
        max_quote_words: usize,
    ) -> Self {
        Self {
            llm,
            cleaner,
            pre_checks,
            guard,
            max_words,
            max_quote_words,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            r#"You are an expert podcast script writer specializing in newsletter summaries.

Write engaging, conversational scripts for audio that:
- Are {max} words or fewer
- Sound natural when spoken aloud
- Never quote more than {quote} words directly
- Are transformative commentary, not a restatement of the source
- Explain why the story matters, using phrases like "this means" or "why this matters"

Respond with a JSON object with these fields:
- "script": the podcast script text ({max} words max)
- "type": content type ("news", "research", "opinion", "tutorial", ...)
- "key_topics": array of 2-4 key topics"#,
            max = self.max_words,
            quote = self.max_quote_words
        )
    }

    fn user_prompt(&self, title: &str, content: &str) -> String {
        let content: String = if content.chars().count() > MAX_PROMPT_CHARS {
            let head: String = content.chars().take(MAX_PROMPT_CHARS).collect();
            format!("{}...", head)
        } else {
            content.to_string()
        };

        format!(
            "Article Title: {}\n\nArticle Content:\n{}\n\nCreate a {}-word podcast script that turns this content into engaging audio commentary. Focus on insights and implications rather than direct quotes.",
            title, content, self.max_words
        )
    }

    fn skipped(&self, item: &RawItem, reason: String) -> ProcessedItem {
        tracing::warn!("Skipping '{}': {}", item.title, reason);
        let mut notes = Notes::new();
        notes.insert("source".into(), json!(item.source_name));
        notes.insert("skipped".into(), json!(true));
        notes.insert("skip_reason".into(), json!(reason));
        notes.insert("summary_method".into(), json!("openai"));

        ProcessedItem {
            title: item.title.clone(),
            script: String::new(),
            sources: vec![item.url.clone()],
            notes,
            word_count: 0,
        }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn summarize(&self, item: &RawItem) -> ProcessedItem {
        let cleaned = self.cleaner.extract(&item.content, &item.url).await;

        let verdict = self.pre_checks.check(&item.content, &cleaned);
        if !verdict.passed {
            let reason = verdict.reason.unwrap_or_else(|| "pre_check_failed".to_string());
            return self.skipped(item, reason);
        }

        let reply = match self
            .llm
            .complete_json(&self.system_prompt(), &self.user_prompt(&item.title, &cleaned), MAX_TOKENS)
            .await
        {
            Ok(value) => value,
            Err(e) => return self.skipped(item, format!("error: {}", e)),
        };

        let reply: SummaryReply = match serde_json::from_value(reply) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("Malformed summary reply: {}", e);
                return self.skipped(item, "summarization_failed".to_string());
            }
        };

        let policy = self.guard.check(&reply.script, &item.title);
        for warning in &policy.warnings {
            tracing::debug!("'{}': {}", item.title, warning);
        }
        if let Some(reason) = policy.reason() {
            return self.skipped(item, format!("policy_violation: {}", reason));
        }

        let mut notes = Notes::new();
        notes.insert("source".into(), json!(item.source_name));
        notes.insert("summary_method".into(), json!("openai"));
        notes.insert("model".into(), json!(self.llm.model_name()));
        notes.insert("original_length".into(), json!(verdict.word_count));
        notes.insert("paywalled".into(), json!(false));
        notes.insert("policy_warnings".into(), json!(policy.warnings));
        notes.insert("key_topics".into(), json!(reply.key_topics));
        notes.insert("summary_type".into(), json!(reply.kind));

        ProcessedItem {
            title: item.title.clone(),
            word_count: count_words(&reply.script),
            script: reply.script,
            sources: vec![item.url.clone()],
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyChecksConfig, ProcessingConfig};
    use crate::error::{AppError, Result};

    struct CannedModel(Option<serde_json::Value>);

    #[async_trait]
    impl LanguageModel for CannedModel {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn complete_json(&self, _system: &str, _user: &str, _max_tokens: u32) -> Result<serde_json::Value> {
            self.0.clone().ok_or_else(|| AppError::Llm("offline".into()))
        }
    }

    fn summarizer(reply: Option<serde_json::Value>) -> LlmSummarizer {
        let processing = ProcessingConfig {
            fetch_full_content: false,
            ..ProcessingConfig::default()
        };
        LlmSummarizer::new(
            Arc::new(CannedModel(reply)),
            ContentCleaner::new(&processing).unwrap(),
            PreLlmChecker::new(PolicyChecksConfig::default()),
            PolicyGuard::new(PolicyChecksConfig::default(), 50, 30),
            50,
            30,
        )
    }

    fn article() -> RawItem {
        RawItem {
            title: "Faster compilers".into(),
            url: "https://example.com/compilers".into(),
            content: format!("<p>{}</p>", "The new compiler release cuts build times across large projects. ".repeat(6)),
            published: None,
            source_name: "Dev Weekly".into(),
        }
    }

    #[tokio::test]
    async fn good_reply_becomes_processed_item() {
        let reply = json!({
            "script": "Builds just got faster. Why this matters: this means shorter feedback loops for big teams.",
            "type": "news",
            "key_topics": ["compilers", "tooling"]
        });
        let item = summarizer(Some(reply)).summarize(&article()).await;
        assert!(!item.is_skipped());
        assert_eq!(item.word_count, 15);
        assert_eq!(item.notes["model"], "canned");
        assert_eq!(item.notes["summary_type"], "news");
    }

    #[tokio::test]
    async fn policy_violations_skip_the_item() {
        let reply = json!({
            "script": "According to the article, builds are faster.",
            "type": "news",
            "key_topics": []
        });
        let item = summarizer(Some(reply)).summarize(&article()).await;
        assert!(item.is_skipped());
        assert!(item.skip_reason().unwrap().starts_with("policy_violation"));
        assert!(item.script.is_empty());
    }

    #[tokio::test]
    async fn missing_fields_and_api_errors_skip_the_item() {
        let item = summarizer(Some(json!({"script": "x"}))).summarize(&article()).await;
        assert_eq!(item.skip_reason(), Some("summarization_failed"));

        let item = summarizer(None).summarize(&article()).await;
        assert!(item.skip_reason().unwrap().starts_with("error:"));
    }

    #[tokio::test]
    async fn thin_content_never_reaches_the_model() {
        let mut raw = article();
        raw.content = "<p>Too short to summarize.</p>".into();
        let item = summarizer(None).summarize(&raw).await;
        assert!(item.skip_reason().unwrap().starts_with("insufficient_content"));
    }
}
