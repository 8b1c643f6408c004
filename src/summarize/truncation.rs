use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use super::Summarizer;
use crate::feed::clean_html;
use crate::models::{count_words, leading_words, Notes, ProcessedItem, RawItem};
use crate::policy::PaywallDetector;

fn digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

/// Rule-based summarizer: clean the HTML and keep the leading words.
pub struct TruncationSummarizer {
    max_words: usize,
    paywall: PaywallDetector,
}

impl TruncationSummarizer {
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words,
            paywall: PaywallDetector,
        }
    }

    pub fn summarize_now(&self, item: &RawItem) -> ProcessedItem {
        let cleaned = clean_html(&item.content);

        let script = if count_words(&cleaned) <= self.max_words {
            cleaned
        } else {
            format!("{}...", leading_words(&cleaned, self.max_words))
        };

        let mut notes = Notes::new();
        notes.insert("paywalled".into(), json!(self.paywall.is_paywalled(&item.content)));
        notes.insert("has_numbers".into(), json!(digits().is_match(&script)));
        notes.insert("source".into(), json!(item.source_name));
        notes.insert("summary_method".into(), json!("simple"));

        ProcessedItem {
            title: item.title.clone(),
            word_count: count_words(&script),
            script,
            sources: vec![item.url.clone()],
            notes,
        }
    }
}

#[async_trait]
impl Summarizer for TruncationSummarizer {
    fn name(&self) -> &'static str {
        "simple"
    }

    async fn summarize(&self, item: &RawItem) -> ProcessedItem {
        self.summarize_now(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(content: &str) -> RawItem {
        RawItem {
            title: "Release notes".into(),
            url: "https://example.com/post".into(),
            content: content.into(),
            published: None,
            source_name: "Weekly".into(),
        }
    }

    #[test]
    fn long_content_is_cut_with_ellipsis() {
        let body = format!("<p>{}</p>", "alpha ".repeat(80));
        let item = TruncationSummarizer::new(50).summarize_now(&raw(&body));
        assert_eq!(item.word_count, 50);
        assert!(item.script.ends_with("alpha..."));
        assert_eq!(item.sources, vec!["https://example.com/post".to_string()]);
        assert_eq!(item.notes["summary_method"], "simple");
        assert_eq!(item.notes["source"], "Weekly");
    }

    #[test]
    fn short_content_is_kept_whole() {
        let item = TruncationSummarizer::new(50).summarize_now(&raw("<b>GPT-5</b> ships in 3 sizes."));
        assert_eq!(item.script, "GPT-5 ships in 3 sizes.");
        assert_eq!(item.notes["has_numbers"], true);
        assert_eq!(item.notes["paywalled"], false);
        assert!(!item.is_skipped());
    }

    #[test]
    fn paywall_is_noted_not_skipped() {
        let item = TruncationSummarizer::new(50).summarize_now(&raw("Subscribe to continue reading"));
        assert_eq!(item.notes["paywalled"], true);
        assert!(!item.script.is_empty());
    }
}
