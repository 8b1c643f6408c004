use std::io::Write;
use std::path::Path;

use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::OutputConfig;
use crate::error::{AppError, Result};
use crate::models::EpisodeEntry;

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

fn text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// MIME type for an episode file, from its extension.
pub fn mime_for(file: &str) -> &'static str {
    match Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        _ => "audio/mpeg",
    }
}

/// Podcast feed built from the episode history, newest first.
pub struct RssGenerator<'a> {
    output: &'a OutputConfig,
}

impl<'a> RssGenerator<'a> {
    pub fn new(output: &'a OutputConfig) -> Self {
        Self { output }
    }

    pub fn render(&self, episodes: &[EpisodeEntry]) -> Result<String> {
        let now = Utc::now().to_rfc2822();
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute(("xmlns:itunes", ITUNES_NS));
        w.write_event(Event::Start(rss))?;
        w.write_event(Event::Start(BytesStart::new("channel")))?;

        text_element(&mut w, "title", &self.output.podcast_title)?;
        text_element(&mut w, "description", &self.output.podcast_description)?;
        text_element(&mut w, "link", &self.output.base_url)?;
        text_element(&mut w, "language", "en-us")?;
        text_element(&mut w, "pubDate", &now)?;
        text_element(&mut w, "lastBuildDate", &now)?;
        text_element(&mut w, "generator", "InboxCast")?;
        text_element(&mut w, "itunes:author", "InboxCast")?;
        text_element(&mut w, "itunes:summary", &self.output.podcast_description)?;
        let mut category = BytesStart::new("itunes:category");
        category.push_attribute(("text", "Technology"));
        w.write_event(Event::Empty(category))?;
        text_element(&mut w, "itunes:explicit", "false")?;

        for episode in episodes {
            w.write_event(Event::Start(BytesStart::new("item")))?;
            text_element(&mut w, "title", &episode.title)?;
            text_element(&mut w, "description", &episode.description)?;
            text_element(&mut w, "pubDate", &episode.pub_date)?;

            let mut guid = BytesStart::new("guid");
            guid.push_attribute(("isPermaLink", "false"));
            w.write_event(Event::Start(guid))?;
            w.write_event(Event::Text(BytesText::new(&episode.guid)))?;
            w.write_event(Event::End(BytesEnd::new("guid")))?;

            let length = episode.file_size.to_string();
            let mut enclosure = BytesStart::new("enclosure");
            enclosure.push_attribute(("url", episode.episode_url.as_str()));
            enclosure.push_attribute(("type", mime_for(&episode.episode_url)));
            enclosure.push_attribute(("length", length.as_str()));
            w.write_event(Event::Empty(enclosure))?;

            text_element(&mut w, "itunes:duration", &episode.duration)?;
            text_element(&mut w, "itunes:summary", &episode.description)?;
            w.write_event(Event::End(BytesEnd::new("item")))?;
        }

        w.write_event(Event::End(BytesEnd::new("channel")))?;
        w.write_event(Event::End(BytesEnd::new("rss")))?;

        String::from_utf8(w.into_inner())
            .map_err(|e| AppError::Other(anyhow::anyhow!("feed is not UTF-8: {}", e)))
    }

    pub fn write(&self, path: &Path, episodes: &[EpisodeEntry]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render(episodes)?)?;
        tracing::info!("Generated RSS feed with {} episodes: {}", episodes.len(), path.display());
        Ok(())
    }
}

/// Outcome of checking a generated feed.
#[derive(Debug, Clone, Default)]
pub struct FeedReport {
    pub title: Option<String>,
    pub episodes: usize,
    pub problems: Vec<String>,
}

impl FeedReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Parse a feed file and check the elements podcast clients need.
pub fn validate_feed(path: &Path) -> Result<FeedReport> {
    if !path.exists() {
        return Err(AppError::Pipeline(format!("Feed file not found: {}", path.display())));
    }
    let bytes = std::fs::read(path)?;
    let feed = feed_rs::parser::parse(&bytes[..])?;
    let raw = String::from_utf8_lossy(&bytes);

    let mut report = FeedReport {
        title: feed.title.as_ref().map(|t| t.content.clone()),
        episodes: feed.entries.len(),
        problems: Vec::new(),
    };

    if report.title.is_none() {
        report.problems.push("channel has no title".to_string());
    }
    if feed.description.is_none() {
        report.problems.push("channel has no description".to_string());
    }
    if !raw.contains(ITUNES_NS) {
        report.problems.push("missing iTunes namespace".to_string());
    }
    for entry in &feed.entries {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| entry.id.clone());
        if entry.title.is_none() {
            report.problems.push(format!("item {} has no title", entry.id));
        }
        let has_enclosure = entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .any(|c| c.url.is_some());
        if !has_enclosure {
            report.problems.push(format!("item '{}' has no enclosure", title));
        }
        if entry.published.is_none() {
            report.problems.push(format!("item '{}' has no pubDate", title));
        }
    }

    Ok(report)
}
