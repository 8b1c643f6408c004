mod cleaner;
mod fetcher;
mod opml;

pub use cleaner::{clean_html, ContentCleaner};
pub use fetcher::FeedFetcher;
pub use opml::load_feeds as load_opml_feeds;
