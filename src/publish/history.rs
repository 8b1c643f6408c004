use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::EpisodeEntry;

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    max_episodes: usize,
    last_updated: String,
    #[serde(default)]
    episodes: Vec<EpisodeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_episodes: usize,
    pub max_episodes: usize,
    pub oldest_episode: Option<String>,
    pub newest_episode: Option<String>,
    pub history_file: PathBuf,
}

/// Bounded, newest-first list of published episodes.
pub struct EpisodeHistory {
    path: PathBuf,
    max_episodes: usize,
    episodes: Vec<EpisodeEntry>,
}

impl EpisodeHistory {
    /// A missing or corrupt file starts an empty history.
    pub fn load(path: &Path, max_episodes: usize) -> Self {
        let path = path.to_path_buf();
        let mut episodes = if path.exists() {
            match std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_json::from_str::<HistoryFile>(&s).map_err(anyhow::Error::from))
            {
                Ok(file) => file.episodes,
                Err(e) => {
                    tracing::warn!("Could not load episode history {}: {}", path.display(), e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        episodes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut history = Self {
            path,
            max_episodes,
            episodes,
        };
        if history.evict_overflow() {
            if let Err(e) = history.save() {
                tracing::warn!("Could not save trimmed history {}: {}", history.path.display(), e);
            }
        }
        history
    }

    /// Drop entries past the limit, oldest last. Returns whether any were dropped.
    fn evict_overflow(&mut self) -> bool {
        if self.episodes.len() <= self.max_episodes {
            return false;
        }
        for old in self.episodes.split_off(self.max_episodes) {
            tracing::info!("Evicting episode {}", old.date);
            remove_local_files(&old);
        }
        true
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = HistoryFile {
            max_episodes: self.max_episodes,
            last_updated: Utc::now().to_rfc3339(),
            episodes: self.episodes.clone(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Insert `entry` as the newest episode, replacing any entry with the same
    /// date, and evict the oldest entries past the limit.
    pub fn add(&mut self, entry: EpisodeEntry) -> Result<()> {
        self.episodes.retain(|e| e.date != entry.date);
        self.episodes.insert(0, entry);
        self.evict_overflow();
        self.save()
    }

    /// Remove the episode for `date` and its local files. Returns whether one
    /// was found.
    pub fn remove(&mut self, date: &str) -> Result<bool> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.episodes.drain(..).partition(|e| e.date == date);
        self.episodes = kept;

        if removed.is_empty() {
            return Ok(false);
        }
        for episode in &removed {
            remove_local_files(episode);
        }
        self.save()?;
        Ok(true)
    }

    pub fn episodes(&self) -> &[EpisodeEntry] {
        &self.episodes
    }

    pub fn latest(&self) -> Option<&EpisodeEntry> {
        self.episodes.first()
    }

    pub fn exists(&self, date: &str) -> bool {
        self.episodes.iter().any(|e| e.date == date)
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total_episodes: self.episodes.len(),
            max_episodes: self.max_episodes,
            oldest_episode: self.episodes.last().map(|e| e.date.clone()),
            newest_episode: self.episodes.first().map(|e| e.date.clone()),
            history_file: self.path.clone(),
        }
    }
}

// Cloud copies are left alone.
fn remove_local_files(episode: &EpisodeEntry) {
    for file in [&episode.metadata_file, &episode.episode_file] {
        if file.is_empty() {
            continue;
        }
        let path = Path::new(file);
        if path.exists() {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::info!("Removed old episode file: {}", file),
                Err(e) => tracing::warn!("Could not delete {}: {}", file, e),
            }
        }
    }
}
