mod episode;
mod item;

pub use episode::{format_duration, EpisodeEntry, EpisodeScript, EpisodeSegment};
pub use item::{count_words, leading_words, Notes, PlannedItem, ProcessedItem, RawItem};
