use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::WORDS_PER_MINUTE;
use crate::error::Result;
use crate::models::PlannedItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub start_ms: u64,
    pub title: String,
}

/// Contents of `episode.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub episode_date: String,
    pub total_items: usize,
    pub estimated_duration_ms: u64,
    pub chapters: Vec<Chapter>,
    pub sources: Vec<String>,
}

impl EpisodeMetadata {
    /// Chapter marks assume every item is read at 165 WPM with `gap_ms` of
    /// silence after it.
    pub fn from_items(items: &[PlannedItem], gap_ms: u32) -> Self {
        let mut chapters = Vec::with_capacity(items.len());
        let mut current_ms = 0u64;

        for item in items {
            chapters.push(Chapter {
                start_ms: current_ms,
                title: item.title.clone(),
            });
            let spoken_ms = item.allocated_words as u64 * 60_000 / WORDS_PER_MINUTE as u64;
            current_ms += spoken_ms + gap_ms as u64;
        }

        let mut sources: Vec<String> = Vec::new();
        for source in items.iter().flat_map(|i| i.sources.iter()) {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }

        Self {
            episode_date: Utc::now().to_rfc3339(),
            total_items: items.len(),
            estimated_duration_ms: current_ms,
            chapters,
            sources,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!("Generated metadata: {}", path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Notes;

    fn planned(title: &str, words: usize, sources: &[&str]) -> PlannedItem {
        PlannedItem {
            title: title.into(),
            script: vec!["w"; words].join(" "),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            notes: Notes::new(),
            word_count: words,
            allocated_words: words,
        }
    }

    #[test]
    fn chapters_advance_by_speech_time_plus_gap() {
        let items = [
            planned("First", 165, &["https://a.example.com"]),
            planned("Second", 33, &["https://b.example.com", "https://a.example.com"]),
        ];
        let meta = EpisodeMetadata::from_items(&items, 200);

        assert_eq!(meta.total_items, 2);
        assert_eq!(meta.chapters[0].start_ms, 0);
        assert_eq!(meta.chapters[1].start_ms, 60_200);
        assert_eq!(meta.estimated_duration_ms, 60_200 + 12_000 + 200);
        assert_eq!(meta.sources, ["https://a.example.com", "https://b.example.com"]);
    }

    #[test]
    fn metadata_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.json");
        let meta = EpisodeMetadata::from_items(&[planned("Only", 10, &[])], 200);
        meta.write(&path).unwrap();
        assert_eq!(EpisodeMetadata::read(&path).unwrap(), meta);
    }
}
