use std::time::Duration;

use feed_rs::parser;
use reqwest::Client;

use crate::config::FeedConfig;
use crate::error::Result;
use crate::models::RawItem;

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("inboxcast/1.0")
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch_feed(&self, feed: &FeedConfig, max_items: usize) -> Result<Vec<RawItem>> {
        let response = self.client.get(&feed.url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        parse_feed(&bytes, max_items)
    }

    /// Fetch every feed in turn. A feed that fails is logged and skipped.
    pub async fn fetch_all(&self, feeds: &[FeedConfig], max_items: usize) -> Vec<RawItem> {
        let mut items = Vec::new();

        for feed in feeds {
            match self.fetch_feed(feed, max_items).await {
                Ok(fetched) => {
                    tracing::info!("Fetched {} items from {}", fetched.len(), feed.url);
                    items.extend(fetched);
                }
                Err(e) => tracing::warn!("Error fetching RSS feed {}: {}", feed.url, e),
            }
        }

        tracing::info!("Total items fetched: {}", items.len());
        items
    }

    /// Whether `url` answers with something feed-rs can parse.
    pub async fn probe(&self, url: &str) -> Result<usize> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("HTTP {}", response.status()).into());
        }
        let bytes = response.bytes().await?;
        Ok(parser::parse(&bytes[..])?.entries.len())
    }
}

/// Parse a feed document into at most `max_items` raw items (0 means no limit).
pub fn parse_feed(bytes: &[u8], max_items: usize) -> Result<Vec<RawItem>> {
    let feed = parser::parse(bytes)?;

    let source_name = feed
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Unknown".to_string());
    let total = feed.entries.len();
    let limit = if max_items == 0 { total } else { max_items };

    let items: Vec<RawItem> = feed
        .entries
        .into_iter()
        .take(limit)
        .map(|entry| {
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            // Try content first, then fall back to summary, then the title itself
            let content = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content))
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| title.clone());

            RawItem {
                title,
                url: entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default(),
                content,
                published: entry.published.or(entry.updated),
                source_name: source_name.clone(),
            }
        })
        .collect();

    if total > items.len() {
        tracing::debug!(
            "{}: kept {} of {} entries",
            source_name,
            items.len(),
            total
        );
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Weekly AI</title>
    <link>https://weekly.example.com</link>
    <description>Newsletter</description>
    <item>
      <title>Model release</title>
      <link>https://weekly.example.com/model?utm=rss</link>
      <description>&lt;p&gt;A new model shipped.&lt;/p&gt;</description>
      <pubDate>Fri, 05 Sep 2025 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Only a title</title>
      <link>https://weekly.example.com/title</link>
    </item>
    <item>
      <title>Third</title>
      <link>https://weekly.example.com/third</link>
      <description>Third body</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn entries_become_raw_items() {
        let items = parse_feed(RSS.as_bytes(), 0).unwrap();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].title, "Model release");
        assert_eq!(items[0].source_name, "Weekly AI");
        assert_eq!(items[0].url, "https://weekly.example.com/model?utm=rss");
        assert!(items[0].content.contains("A new model shipped."));
        assert!(items[0].published.is_some());

        // No body at all: the title stands in for the content.
        assert_eq!(items[1].content, "Only a title");
        assert!(items[1].published.is_none());
    }

    #[test]
    fn max_items_limits_each_feed() {
        let items = parse_feed(RSS.as_bytes(), 2).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].title, "Only a title");
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_feed(b"definitely not xml", 5).is_err());
    }
}
