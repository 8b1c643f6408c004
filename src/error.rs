use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("OPML error: {0}")]
    Opml(#[from] opml::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM API error: {0}")]
    Llm(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Cloud storage error: {0}")]
    Cloud(String),

    #[error("{0}")]
    Pipeline(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_displays_message_only() {
        let e = AppError::Pipeline("No items fetched from RSS feeds".into());
        assert_eq!(e.to_string(), "No items fetched from RSS feeds");
    }

    #[test]
    fn domain_errors_carry_prefix() {
        assert_eq!(
            AppError::Tts("espeak failed".into()).to_string(),
            "TTS error: espeak failed"
        );
        assert!(AppError::Config("missing rss_feeds".into())
            .to_string()
            .starts_with("Configuration error"));
    }

    #[test]
    fn anyhow_errors_convert() {
        let e: AppError = anyhow::anyhow!("Failed to fetch feed: HTTP 500").into();
        assert_eq!(e.to_string(), "Failed to fetch feed: HTTP 500");
    }
}
