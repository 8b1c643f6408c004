mod metadata;
mod rss;

pub use metadata::EpisodeMetadata;
pub use rss::{mime_for, validate_feed, RssGenerator};
