use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form annotations attached to an item by the summarizer.
pub type Notes = BTreeMap<String, serde_json::Value>;

/// One fetched feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: String,
    pub url: String,
    pub content: String,
    pub published: Option<DateTime<Utc>>,
    pub source_name: String,
}

/// Summarized content ready for planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedItem {
    pub title: String,
    pub script: String,
    pub sources: Vec<String>,
    pub notes: Notes,
    pub word_count: usize,
}

impl ProcessedItem {
    /// Items the summarizer refused to process carry an empty script and a
    /// `skipped` note.
    pub fn is_skipped(&self) -> bool {
        self.notes
            .get("skipped")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.notes.get("skip_reason").and_then(|v| v.as_str())
    }
}

/// A processed item after the episode builder assigned it a word budget.
///
/// `word_count` is the length of the source script; `script` has been cut to
/// exactly `allocated_words` words, so `allocated_words <= word_count` always.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedItem {
    pub title: String,
    pub script: String,
    pub sources: Vec<String>,
    pub notes: Notes,
    pub word_count: usize,
    pub allocated_words: usize,
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keep the first `max_words` whitespace-separated words of `text`.
pub fn leading_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
