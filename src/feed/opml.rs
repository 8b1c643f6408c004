use std::path::Path;

use opml::{Outline, OPML};

use crate::config::FeedConfig;
use crate::error::{AppError, Result};

/// Read feed subscriptions from an OPML file, including nested folders.
pub fn load_feeds(path: &Path) -> Result<Vec<FeedConfig>> {
    if !path.exists() {
        return Err(AppError::Config(format!("OPML file not found: {}", path.display())));
    }
    let content = std::fs::read_to_string(path)?;
    parse_feeds(&content)
}

pub fn parse_feeds(content: &str) -> Result<Vec<FeedConfig>> {
    let document = OPML::from_str(content)?;
    let mut feeds = Vec::new();
    collect(&document.body.outlines, &mut feeds);
    Ok(feeds)
}

fn collect(outlines: &[Outline], feeds: &mut Vec<FeedConfig>) {
    for outline in outlines {
        if let Some(url) = outline.xml_url.as_deref().filter(|u| !u.trim().is_empty()) {
            feeds.push(FeedConfig {
                url: url.trim().to_string(),
                weight: 1.0,
            });
        }
        collect(&outline.outlines, feeds);
    }
}
