use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Speaking rate used everywhere a word count is turned into a duration.
pub const WORDS_PER_MINUTE: u32 = 165;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rss_feeds: Vec<FeedConfig>,

    /// Optional OPML subscription list whose feeds are appended to `rss_feeds`.
    #[serde(default)]
    pub opml_file: Option<PathBuf>,

    #[serde(default = "default_target_duration")]
    pub target_duration: u32,

    #[serde(default = "default_max_rss_items")]
    pub max_rss_items: usize,

    #[serde(default)]
    pub voice_settings: VoiceConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub cloud: CloudConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProviderKind {
    Minimax,
    Espeak,
    #[serde(alias = "silence")]
    Dummy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_provider")]
    pub provider: TtsProviderKind,
    #[serde(default = "default_wpm")]
    pub wpm: u32,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_audio_format")]
    pub audio_format: AudioFormat,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_bitrate")]
    pub bitrate: String,
    #[serde(default = "default_episode_filename")]
    pub episode_filename: String,
    #[serde(default = "default_rss_filename")]
    pub rss_filename: String,
    #[serde(default = "default_gap_ms")]
    pub gap_ms: u32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_episodes")]
    pub max_episodes: usize,
    #[serde(default = "default_podcast_title")]
    pub podcast_title: String,
    #[serde(default = "default_podcast_description")]
    pub podcast_description: String,
    /// Decode, fade and normalize segments instead of raw PCM concatenation.
    #[serde(default = "default_true")]
    pub enhanced_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizerKind {
    Simple,
    #[serde(alias = "llm")]
    Openai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeduplicatorKind {
    Simple,
    Semantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyChecksConfig {
    // Applied before the LLM call
    #[serde(default = "default_true")]
    pub paywall_detection: bool,
    #[serde(default = "default_true")]
    pub min_content_length: bool,
    #[serde(default = "default_true")]
    pub content_quality_check: bool,
    #[serde(default)]
    pub url_allowlist_check: bool,

    // Applied to the generated script
    #[serde(default = "default_true")]
    pub max_word_count: bool,
    #[serde(default = "default_true")]
    pub quote_length_check: bool,
    #[serde(default = "default_true")]
    pub derivative_language_check: bool,
    #[serde(default = "default_true")]
    pub transformative_analysis_check: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_summarizer")]
    pub summarizer: SummarizerKind,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_openai_temperature")]
    pub openai_temperature: f32,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_deduplicator")]
    pub deduplicator: DeduplicatorKind,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_cache_days")]
    pub embedding_cache_days: i64,

    #[serde(default = "default_true")]
    pub use_readability: bool,
    #[serde(default = "default_true")]
    pub fetch_full_content: bool,
    #[serde(default = "default_content_timeout")]
    pub content_timeout: u64,

    #[serde(default = "default_max_quote_words")]
    pub max_quote_words: usize,

    /// Wrap planned items in an intro, themed segments and a conclusion.
    #[serde(default)]
    pub episode_script: bool,

    #[serde(default)]
    pub policy_checks: PolicyChecksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_container_name")]
    pub container_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f32 {
    1.0
}

fn default_target_duration() -> u32 {
    10
}

fn default_max_rss_items() -> usize {
    20
}

fn default_provider() -> TtsProviderKind {
    TtsProviderKind::Espeak
}

fn default_wpm() -> u32 {
    WORDS_PER_MINUTE
}

fn default_voice_id() -> String {
    "default".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_audio_format() -> AudioFormat {
    AudioFormat::Mp3
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_bitrate() -> String {
    "128k".to_string()
}

fn default_episode_filename() -> String {
    "episode.mp3".to_string()
}

fn default_rss_filename() -> String {
    "feed.xml".to_string()
}

fn default_gap_ms() -> u32 {
    200
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_max_episodes() -> usize {
    5
}

fn default_podcast_title() -> String {
    "InboxCast".to_string()
}

fn default_podcast_description() -> String {
    "AI-generated newsletter summaries".to_string()
}

fn default_summarizer() -> SummarizerKind {
    SummarizerKind::Simple
}

fn default_max_words() -> usize {
    50
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_temperature() -> f32 {
    0.3
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_deduplicator() -> DeduplicatorKind {
    DeduplicatorKind::Simple
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_cache_days() -> i64 {
    7
}

fn default_content_timeout() -> u64 {
    10
}

fn default_max_quote_words() -> usize {
    30
}

fn default_container_name() -> String {
    "podcast-files".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            wpm: default_wpm(),
            voice_id: default_voice_id(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            audio_format: default_audio_format(),
            sample_rate: default_sample_rate(),
            bitrate: default_bitrate(),
            episode_filename: default_episode_filename(),
            rss_filename: default_rss_filename(),
            gap_ms: default_gap_ms(),
            base_url: default_base_url(),
            max_episodes: default_max_episodes(),
            podcast_title: default_podcast_title(),
            podcast_description: default_podcast_description(),
            enhanced_audio: true,
        }
    }
}

impl Default for PolicyChecksConfig {
    fn default() -> Self {
        Self {
            paywall_detection: true,
            min_content_length: true,
            content_quality_check: true,
            url_allowlist_check: false,
            max_word_count: true,
            quote_length_check: true,
            derivative_language_check: true,
            transformative_analysis_check: true,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            summarizer: default_summarizer(),
            max_words: default_max_words(),
            openai_model: default_openai_model(),
            openai_temperature: default_openai_temperature(),
            openai_base_url: default_openai_base_url(),
            deduplicator: default_deduplicator(),
            similarity_threshold: default_similarity_threshold(),
            embedding_model: default_embedding_model(),
            embedding_cache_days: default_embedding_cache_days(),
            use_readability: true,
            fetch_full_content: true,
            content_timeout: default_content_timeout(),
            max_quote_words: default_max_quote_words(),
            episode_script: false,
            policy_checks: PolicyChecksConfig::default(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            container_name: default_container_name(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rss_feeds: Vec::new(),
            opml_file: None,
            target_duration: default_target_duration(),
            max_rss_items: default_max_rss_items(),
            voice_settings: VoiceConfig::default(),
            output: OutputConfig::default(),
            processing: ProcessingConfig::default(),
            cloud: CloudConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load a YAML config file, or TOML when the extension says so.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path.extension().and_then(|e| e.to_str()))
    }

    pub fn parse(content: &str, extension: Option<&str>) -> Result<Self> {
        let config: Config = match extension {
            Some("toml") => toml::from_str(content)?,
            _ => serde_yaml::from_str(content)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rss_feeds.is_empty() && self.opml_file.is_none() {
            return Err(AppError::Config(
                "no feeds configured (set rss_feeds or opml_file)".to_string(),
            ));
        }
        if self.target_duration == 0 {
            return Err(AppError::Config(
                "target_duration must be at least 1 minute".to_string(),
            ));
        }
        if self.voice_settings.wpm == 0 {
            return Err(AppError::Config("voice_settings.wpm must be positive".to_string()));
        }
        if self.output.max_episodes == 0 {
            return Err(AppError::Config("output.max_episodes must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.processing.similarity_threshold) {
            return Err(AppError::Config(
                "processing.similarity_threshold must be within 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn history_path(&self) -> PathBuf {
        self.output.directory.join("episodes_history.json")
    }

    pub fn feed_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.rss_filename)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.output.directory.join("episode.json")
    }

    pub fn script_path(&self) -> PathBuf {
        self.output.directory.join("episode_script.txt")
    }
}

/// API credentials, resolved once at startup and passed to the services that need them.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub openai_api_key: Option<String>,
    pub minimax_api_key: Option<String>,
    pub minimax_group_id: Option<String>,
    pub azure_connection_string: Option<String>,
}

impl Secrets {
    /// The process environment wins over `./.env`, which wins over `~/.env`.
    pub fn load() -> Self {
        let mut files = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            files.push(cwd.join(".env"));
        }
        if let Some(home) = dirs::home_dir() {
            files.push(home.join(".env"));
        }
        load_env_files(&files);

        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            minimax_api_key: get("MINIMAX_API_KEY"),
            minimax_group_id: get("MINIMAX_GROUP_ID"),
            azure_connection_string: get("AZURE_STORAGE_CONNECTION_STRING"),
        }
    }
}

/// Load each file into the process environment. Variables that are already
/// set are never overwritten, so earlier files take precedence.
fn load_env_files(files: &[PathBuf]) {
    for file in files.iter().filter(|f| f.exists()) {
        if let Err(e) = dotenv::from_path(file) {
            tracing::warn!("Failed to read {}: {}", file.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r#"
rss_feeds:
  - url: https://example.com/feed.xml
target_duration: 5
voice_settings:
  provider: dummy
  wpm: 180
output:
  audio_format: wav
processing:
  summarizer: openai
  policy_checks:
    quote_length_check: false
"#;

    #[test]
    fn yaml_config_fills_defaults() {
        let config = Config::parse(MINIMAL_YAML, Some("yaml")).unwrap();
        assert_eq!(config.target_duration, 5);
        assert_eq!(config.rss_feeds[0].weight, 1.0);
        assert_eq!(config.voice_settings.provider, TtsProviderKind::Dummy);
        assert_eq!(config.voice_settings.voice_id, "default");
        assert_eq!(config.output.audio_format, AudioFormat::Wav);
        assert_eq!(config.output.gap_ms, 200);
        assert_eq!(config.output.max_episodes, 5);
        assert_eq!(config.processing.summarizer, SummarizerKind::Openai);
        assert_eq!(config.processing.deduplicator, DeduplicatorKind::Simple);
        assert!(!config.processing.policy_checks.quote_length_check);
        assert!(config.processing.policy_checks.paywall_detection);
        assert_eq!(config.max_rss_items, 20);
    }

    #[test]
    fn toml_config_is_accepted() {
        let toml = r#"
target_duration = 3

[[rss_feeds]]
url = "https://example.com/rss"

[voice_settings]
provider = "silence"
"#;
        let config = Config::parse(toml, Some("toml")).unwrap();
        assert_eq!(config.target_duration, 3);
        assert_eq!(config.voice_settings.provider, TtsProviderKind::Dummy);
    }

    #[test]
    fn config_without_feeds_is_rejected() {
        let err = Config::parse("target_duration: 5\n", None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let yaml = "rss_feeds: [{url: 'https://a.example/rss'}]\ntarget_duration: 0\n";
        assert!(Config::parse(yaml, None).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/config.yaml"));
    }

    #[test]
    fn env_files_never_override_earlier_values() {
        let dir = tempfile::tempdir().unwrap();
        let cwd_env = dir.path().join("cwd.env");
        let home_env = dir.path().join("home.env");
        std::fs::write(&cwd_env, "INBOXCAST_TEST_SHARED=cwd\n").unwrap();
        std::fs::write(
            &home_env,
            "INBOXCAST_TEST_SHARED=home\nINBOXCAST_TEST_HOME_ONLY=home\n",
        )
        .unwrap();

        load_env_files(&[cwd_env, home_env, dir.path().join("missing.env")]);
        assert_eq!(std::env::var("INBOXCAST_TEST_SHARED").unwrap(), "cwd");
        assert_eq!(std::env::var("INBOXCAST_TEST_HOME_ONLY").unwrap(), "home");
    }

    #[test]
    fn secrets_come_from_known_keys() {
        let mut vars = HashMap::new();
        vars.insert("OPENAI_API_KEY".to_string(), " sk-test ".to_string());
        vars.insert("MINIMAX_GROUP_ID".to_string(), "group".to_string());
        let secrets = Secrets::from_vars(&vars);
        assert_eq!(secrets.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(secrets.minimax_group_id.as_deref(), Some("group"));
        assert!(secrets.azure_connection_string.is_none());
    }

    #[test]
    fn blank_secrets_are_treated_as_missing() {
        let mut vars = HashMap::new();
        vars.insert("MINIMAX_API_KEY".to_string(), "  ".to_string());
        assert!(Secrets::from_vars(&vars).minimax_api_key.is_none());
    }
}
