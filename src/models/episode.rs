use serde::{Deserialize, Serialize};

use super::item::{count_words, PlannedItem};
use crate::config::WORDS_PER_MINUTE;

/// A themed group of planned items with the line that introduces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSegment {
    pub theme_title: String,
    pub transition: String,
    pub items: Vec<PlannedItem>,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeScript {
    pub introduction: String,
    pub segments: Vec<EpisodeSegment>,
    pub conclusion: String,
    pub total_word_count: usize,
    pub estimated_duration_minutes: f64,
}

impl EpisodeScript {
    pub fn new(introduction: String, segments: Vec<EpisodeSegment>, conclusion: String) -> Self {
        let total_word_count = count_words(&introduction)
            + segments
                .iter()
                .map(|s| s.word_count + count_words(&s.transition))
                .sum::<usize>()
            + count_words(&conclusion);

        Self {
            introduction,
            segments,
            conclusion,
            total_word_count,
            estimated_duration_minutes: total_word_count as f64 / WORDS_PER_MINUTE as f64,
        }
    }

    /// Spoken units in playback order: intro, then transition and items per
    /// segment, then the conclusion. Empty texts are dropped.
    pub fn spoken_segments(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        out.push(("Introduction".to_string(), self.introduction.clone()));
        for segment in &self.segments {
            out.push((segment.theme_title.clone(), segment.transition.clone()));
            for item in &segment.items {
                out.push((item.title.clone(), item.script.clone()));
            }
        }
        out.push(("Conclusion".to_string(), self.conclusion.clone()));
        out.retain(|(_, text)| !text.trim().is_empty());
        out
    }
}

/// One published episode as recorded in `episodes_history.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeEntry {
    /// `YYYY-MM-DD`, unique within the history.
    pub date: String,
    pub title: String,
    pub description: String,
    /// RFC 2822
    pub pub_date: String,
    pub guid: String,
    pub episode_url: String,
    pub file_size: u64,
    /// `MM:SS`
    pub duration: String,
    pub metadata_file: String,
    pub episode_file: String,
    /// RFC 3339, used for newest-first ordering.
    pub timestamp: String,
}

pub fn format_duration(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
