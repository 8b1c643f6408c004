use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;

use crate::config::ProcessingConfig;
use crate::error::Result;
use crate::models::count_words;
use crate::policy::PaywallDetector;

const USER_AGENT_STRING: &str = "Mozilla/5.0 (compatible; InboxCast/1.0)";
/// Wide enough that html2text never wraps a paragraph.
const RENDER_WIDTH: usize = 10_000;
/// RSS bodies shorter than this trigger a full-page fetch.
const MIN_RSS_WORDS: usize = 50;

struct Patterns {
    boilerplate_blocks: Regex,
    link_refs: Regex,
    footnotes: Regex,
    emphasis: Regex,
    headings: Regex,
    social: Regex,
    edge_pipes: Regex,
    whitespace: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        boilerplate_blocks: Regex::new(
            r"(?is)<(script|style|nav|header|footer|aside)\b[^>]*>.*?</(script|style|nav|header|footer|aside)>",
        )
        .expect("valid regex"),
        link_refs: Regex::new(r"\[([^\]]*)\]\[\d+\]").expect("valid regex"),
        footnotes: Regex::new(r"(?m)^\s*\[\d+\]:.*$").expect("valid regex"),
        emphasis: Regex::new(r"\*{1,2}([^*\n]+)\*{1,2}").expect("valid regex"),
        headings: Regex::new(r"(?m)^#+\s*").expect("valid regex"),
        social: Regex::new(r"(?i)(Share on|Follow us|Subscribe)").expect("valid regex"),
        edge_pipes: Regex::new(r"^\s*\|\s*|\s*\|\s*$").expect("valid regex"),
        whitespace: Regex::new(r"\s+").expect("valid regex"),
    })
}

/// Turns feed HTML into plain text suitable for summarization.
pub struct ContentCleaner {
    client: Client,
    fetch_full_content: bool,
    use_readability: bool,
    paywall: PaywallDetector,
}

impl ContentCleaner {
    pub fn new(processing: &ProcessingConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));

        let client = Client::builder()
            .timeout(Duration::from_secs(processing.content_timeout))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            fetch_full_content: processing.fetch_full_content,
            use_readability: processing.use_readability,
            paywall: PaywallDetector,
        })
    }

    /// Clean `raw` and, when it is too thin to summarize, try the article page
    /// itself and keep whichever text is longer.
    pub async fn extract(&self, raw: &str, url: &str) -> String {
        let cleaned = self.clean(raw);

        if !self.fetch_full_content || url.is_empty() || count_words(&cleaned) >= MIN_RSS_WORDS {
            return cleaned;
        }

        match self.fetch_page(url).await {
            Ok(Some(html)) => {
                let full = self.clean(&html);
                self.prefer_full_page(cleaned, full, url)
            }
            Ok(None) => cleaned,
            Err(e) => {
                tracing::debug!("Failed to fetch full content from {}: {}", url, e);
                cleaned
            }
        }
    }

    pub fn clean(&self, html: &str) -> String {
        if self.use_readability {
            let stripped = patterns().boilerplate_blocks.replace_all(html, " ");
            clean_html(&stripped)
        } else {
            clean_html(html)
        }
    }

    /// A paywalled page is only a teaser, so the RSS text is kept instead.
    fn prefer_full_page(&self, rss: String, full: String, url: &str) -> String {
        if count_words(&full) <= count_words(&rss) {
            return rss;
        }
        if self.paywall.is_paywalled(&full) {
            tracing::debug!("Full page for {} is paywalled, keeping RSS text", url);
            return rss;
        }
        tracing::debug!("Using full page content for {}", url);
        full
    }

    async fn fetch_page(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            tracing::debug!("Failed to fetch {}: {}", url, response.status());
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }
}

/// HTML to a single line of normalized text.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let text = match html2text::from_read(html.as_bytes(), RENDER_WIDTH) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            html.to_string()
        }
    };

    normalize_text(&text)
}

pub fn normalize_text(text: &str) -> String {
    let p = patterns();
    let text = p.footnotes.replace_all(text, "");
    let text = p.link_refs.replace_all(&text, "$1");
    let text = p.emphasis.replace_all(&text, "$1");
    let text = p.headings.replace_all(&text, "");
    let text = p.whitespace.replace_all(&text, " ");
    let text = p.edge_pipes.replace_all(&text, "");
    let text = p.social.replace_all(&text, "");
    p.whitespace.replace_all(text.trim(), " ").into_owned()
}
