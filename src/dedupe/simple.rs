use std::collections::HashSet;

use async_trait::async_trait;
use url::Url;

use super::Deduplicator;
use crate::models::RawItem;

/// `scheme://host/path`, lowercased, without query, fragment or trailing slash.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default();
            let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
            format!("{}://{}{}{}", url.scheme(), host, port, url.path())
                .to_lowercase()
                .trim_end_matches('/')
                .to_string()
        }
        Err(_) => raw.trim().to_lowercase(),
    }
}

/// Drops items whose normalized URL was already seen.
#[derive(Default)]
pub struct SimpleDeduplicator;

impl SimpleDeduplicator {
    pub fn filter(&self, items: Vec<RawItem>) -> Vec<RawItem> {
        let total = items.len();
        let mut seen_urls = HashSet::new();
        let mut unique = Vec::with_capacity(total);

        for item in items {
            let url = normalize_url(&item.url);
            if !url.is_empty() && !seen_urls.insert(url) {
                tracing::debug!("Skipping duplicate: {}", item.title);
                continue;
            }
            unique.push(item);
        }

        tracing::info!("Dedupe: {} -> {} items", total, unique.len());
        unique
    }
}

#[async_trait]
impl Deduplicator for SimpleDeduplicator {
    fn name(&self) -> &'static str {
        "simple"
    }

    async fn deduplicate(&self, items: Vec<RawItem>) -> Vec<RawItem> {
        self.filter(items)
    }
}
