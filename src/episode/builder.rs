use crate::config::WORDS_PER_MINUTE;
use crate::models::{count_words, leading_words, PlannedItem, ProcessedItem};

/// Fits summarized items into a spoken-word budget.
pub struct EpisodeBuilder {
    words_per_minute: u32,
}

impl EpisodeBuilder {
    pub fn new() -> Self {
        Self {
            words_per_minute: WORDS_PER_MINUTE,
        }
    }

    pub fn target_words(&self, target_minutes: u32) -> usize {
        target_minutes as usize * self.words_per_minute as usize
    }

    /// Select and truncate `items` so the total word count approaches
    /// `target_minutes * 165`.
    ///
    /// At most two items per minute are considered. Each gets an equal share
    /// of the budget (the remainder of the division is dropped), capped by what
    /// is left of the budget and by its own length. Order is preserved and
    /// short items are not backfilled.
    pub fn fit(&self, items: &[ProcessedItem], target_minutes: u32) -> Vec<PlannedItem> {
        let target_words = self.target_words(target_minutes);
        if items.is_empty() || target_words == 0 {
            return Vec::new();
        }

        let max_items = items.len().min(target_minutes as usize * 2);
        let selected = &items[..max_items];
        let words_per_item = target_words / selected.len();

        let mut planned = Vec::with_capacity(selected.len());
        let mut total_words = 0;

        for item in selected {
            if total_words >= target_words {
                break;
            }

            let word_count = count_words(&item.script);
            let remaining = target_words - total_words;
            let allocated_words = words_per_item.min(remaining).min(word_count);

            planned.push(PlannedItem {
                title: item.title.clone(),
                script: leading_words(&item.script, allocated_words),
                sources: item.sources.clone(),
                notes: item.notes.clone(),
                word_count,
                allocated_words,
            });
            total_words += allocated_words;
        }

        tracing::info!(
            "Episode planning: {} -> {} items, {} words",
            items.len(),
            planned.len(),
            total_words
        );
        planned
    }
}

impl Default for EpisodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
