use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::ai::{LanguageModel, OpenAiClient};
use crate::audio::AudioStitcher;
use crate::cloud::AzureBlobUploader;
use crate::config::{AudioFormat, Config, FeedConfig, Secrets, SummarizerKind, TtsProviderKind};
use crate::dedupe;
use crate::episode::{transcript, EpisodeBuilder, EpisodeScriptEngine};
use crate::error::{AppError, Result};
use crate::feed::{load_opml_feeds, FeedFetcher};
use crate::models::{format_duration, EpisodeEntry, PlannedItem, RawItem};
use crate::output::{validate_feed, EpisodeMetadata, RssGenerator};
use crate::publish::EpisodeHistory;
use crate::summarize;
use crate::tts::{ProviderChain, VoiceParams};

/// Where an episode's audio ended up after synthesis.
pub struct EpisodeAudio {
    pub path: PathBuf,
    pub date: String,
    pub format: AudioFormat,
}

pub struct App {
    pub config: Config,
    secrets: Secrets,
}

impl App {
    pub fn new(config: Config, secrets: Secrets) -> Self {
        Self { config, secrets }
    }

    fn output_dir(&self) -> &Path {
        &self.config.output.directory
    }

    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// `episode_YYYY-MM-DD`, with the prefix taken from `episode_filename`.
    fn dated_stem(&self, date: &str) -> String {
        let stem = Path::new(&self.config.output.episode_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("episode");
        format!("{}_{}", stem, date)
    }

    fn episode_path(&self, date: &str, format: AudioFormat) -> PathBuf {
        self.output_dir()
            .join(format!("{}.{}", self.dated_stem(date), format.extension()))
    }

    fn dated_metadata_path(&self, date: &str) -> PathBuf {
        self.output_dir().join(format!("{}.json", self.dated_stem(date)))
    }

    fn feeds(&self) -> Result<Vec<FeedConfig>> {
        let mut feeds = self.config.rss_feeds.clone();
        if let Some(opml) = &self.config.opml_file {
            let extra = load_opml_feeds(opml)?;
            tracing::info!("Loaded {} feeds from {}", extra.len(), opml.display());
            feeds.extend(extra);
        }
        Ok(feeds)
    }

    /// Fetch every feed and drop duplicate stories.
    pub async fn fetch(&self) -> Result<Vec<RawItem>> {
        let feeds = self.feeds()?;
        let fetcher = FeedFetcher::new()?;
        let items = fetcher.fetch_all(&feeds, self.config.max_rss_items).await;
        if items.is_empty() {
            return Err(AppError::Pipeline("No items fetched from RSS feeds".to_string()));
        }

        let deduplicator =
            dedupe::build(&self.config.processing, &self.secrets, self.output_dir()).await;
        let unique = deduplicator.deduplicate(items).await;
        tracing::info!("{} unique items after {} dedupe", unique.len(), deduplicator.name());
        Ok(unique)
    }

    /// Fetch, summarize and fit items to the target duration, then write the
    /// transcript.
    pub async fn plan(&self, minutes: Option<u32>) -> Result<Vec<PlannedItem>> {
        let minutes = minutes.unwrap_or(self.config.target_duration);
        let items = self.fetch().await?;

        let summarizer = summarize::build(&self.config.processing, &self.secrets)?;
        let processed = summarize::summarize_all(summarizer.as_ref(), &items).await;
        if processed.is_empty() {
            return Err(AppError::Pipeline("No items successfully processed".to_string()));
        }

        let planned = EpisodeBuilder::new().fit(&processed, minutes);
        if planned.is_empty() {
            return Err(AppError::Pipeline("Episode plan is empty".to_string()));
        }
        transcript::write(&self.config.script_path(), &planned, &Self::today())?;
        Ok(planned)
    }

    /// Spoken units in playback order: either the planned items as they are,
    /// or the items wrapped in an intro, transitions and a conclusion.
    async fn spoken_units(&self, items: &[PlannedItem], minutes: u32, date: &str) -> Result<Vec<(String, String)>> {
        if !self.config.processing.episode_script {
            return Ok(items
                .iter()
                .map(|i| (i.title.clone(), i.script.clone()))
                .collect());
        }

        let llm: Option<Arc<dyn LanguageModel>> =
            match OpenAiClient::new(self.secrets.openai_api_key.clone(), &self.config.processing) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::info!("Episode script will use templates only: {}", e);
                    None
                }
            };
        let script = EpisodeScriptEngine::new(llm)
            .synthesize(items, minutes, date)
            .await?;
        Ok(script.spoken_segments())
    }

    /// Synthesize and stitch the episode audio for `date`.
    pub async fn synthesize(&self, items: &[PlannedItem], minutes: u32, date: &str) -> Result<EpisodeAudio> {
        let output = &self.config.output;
        let chain = ProviderChain::from_config(&self.config.voice_settings, &self.secrets).await?;
        let params = VoiceParams::from_config(&self.config.voice_settings, output.sample_rate, output.audio_format);

        let mut segments = Vec::new();
        for (title, text) in self.spoken_units(items, minutes, date).await? {
            if text.trim().is_empty() {
                continue;
            }
            match chain.synthesize(&text, &params).await {
                Ok(audio) => segments.push(audio),
                Err(e) => tracing::warn!("TTS failed for '{}': {}", title, e),
            }
        }
        if segments.is_empty() {
            return Err(AppError::Pipeline("No audio generated".to_string()));
        }

        let stitched = AudioStitcher::from_config(output).stitch(&segments);
        let path = self.episode_path(date, stitched.format);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &stitched.bytes)?;
        tracing::info!(
            "Wrote {} segments ({} bytes) to {}",
            segments.len(),
            stitched.bytes.len(),
            path.display()
        );

        Ok(EpisodeAudio {
            path,
            date: date.to_string(),
            format: stitched.format,
        })
    }

    /// Synthesize audio from an existing transcript.
    pub async fn tts(&self, script: Option<PathBuf>) -> Result<EpisodeAudio> {
        let path = script.unwrap_or_else(|| self.config.script_path());
        let items = transcript::read(&path)?;
        if items.is_empty() {
            return Err(AppError::Pipeline(format!("No items found in {}", path.display())));
        }
        println!("Loaded {} items from {}", items.len(), path.display());
        self.synthesize(&items, self.config.target_duration, &Self::today()).await
    }

    fn find_episode_audio(&self, date: &str) -> Result<PathBuf> {
        [AudioFormat::Mp3, AudioFormat::Wav]
            .into_iter()
            .map(|format| self.episode_path(date, format))
            .find(|p| p.exists())
            .ok_or_else(|| AppError::Pipeline(format!("No episode audio found for {}", date)))
    }

    fn uploader(&self) -> Result<AzureBlobUploader> {
        AzureBlobUploader::new(
            self.secrets.azure_connection_string.as_deref(),
            &self.config.cloud.container_name,
        )
    }

    /// Record an episode in the history and regenerate the feed and
    /// metadata. Items default to the current transcript.
    pub async fn publish(
        &self,
        audio: Option<PathBuf>,
        items: Option<Vec<PlannedItem>>,
        upload: bool,
    ) -> Result<EpisodeEntry> {
        let (audio, date) = match audio {
            Some(path) => {
                let date = date_from_filename(&path).unwrap_or_else(Self::today);
                (path, date)
            }
            None => {
                let date = Self::today();
                (self.find_episode_audio(&date)?, date)
            }
        };
        if !audio.exists() {
            return Err(AppError::Pipeline(format!("Audio file not found: {}", audio.display())));
        }

        let items = match items {
            Some(items) => items,
            None if self.config.script_path().exists() => transcript::read(&self.config.script_path())?,
            None => Vec::new(),
        };

        let output = &self.config.output;
        let metadata = EpisodeMetadata::from_items(&items, output.gap_ms);
        let dated_metadata = self.dated_metadata_path(&date);
        metadata.write(&self.config.metadata_path())?;
        metadata.write(&dated_metadata)?;

        let file_name = audio
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let uploader = if upload { Some(self.uploader()?) } else { None };
        let episode_url = match &uploader {
            Some(uploader) => uploader.upload_file(&audio, None).await?,
            None => format!("{}/episode/{}", output.base_url.trim_end_matches('/'), file_name),
        };

        let entry = EpisodeEntry {
            title: format!("Episode {}", date),
            description: describe(&date, &items),
            pub_date: Utc::now().to_rfc2822(),
            guid: episode_url.clone(),
            episode_url,
            file_size: std::fs::metadata(&audio)?.len(),
            duration: format_duration(audio_seconds(&audio, &metadata)),
            metadata_file: dated_metadata.to_string_lossy().into_owned(),
            episode_file: audio.to_string_lossy().into_owned(),
            timestamp: Utc::now().to_rfc3339(),
            date,
        };

        let mut history = EpisodeHistory::load(&self.config.history_path(), output.max_episodes);
        if history.exists(&entry.date) {
            tracing::info!("Replacing existing episode for {}", entry.date);
        }
        history.add(entry.clone())?;
        RssGenerator::new(output).write(&self.config.feed_path(), history.episodes())?;

        if let Some(uploader) = &uploader {
            self.upload_feed_files(uploader).await?;
        }
        Ok(entry)
    }

    async fn upload_feed_files(&self, uploader: &AzureBlobUploader) -> Result<()> {
        let feed_url = uploader
            .upload_file(&self.config.feed_path(), Some(&self.config.output.rss_filename))
            .await?;
        println!("Feed uploaded: {}", feed_url);
        let metadata = self.config.metadata_path();
        if metadata.exists() {
            uploader.upload_file(&metadata, Some("episode.json")).await?;
        }
        Ok(())
    }

    /// Full pipeline: plan, synthesize, publish.
    pub async fn run(&self, minutes: Option<u32>, upload: bool) -> Result<EpisodeEntry> {
        let minutes = minutes.unwrap_or(self.config.target_duration);
        println!("Starting InboxCast pipeline (target: {} minutes)", minutes);

        let planned = self.plan(Some(minutes)).await?;
        let total_words: usize = planned.iter().map(|i| i.allocated_words).sum();
        println!("Planned {} items, {} words", planned.len(), total_words);

        let audio = self.synthesize(&planned, minutes, &Self::today()).await?;
        let upload = upload || self.config.cloud.enabled;
        let entry = self.publish(Some(audio.path.clone()), Some(planned), upload).await?;

        println!("Pipeline completed");
        println!(
            "  Episode:  {} ({}, {})",
            audio.path.display(),
            audio.date,
            audio.format.extension()
        );
        println!("  Duration: {}", entry.duration);
        println!("  Feed:     {}", self.config.feed_path().display());
        println!("  Metadata: {}", self.config.metadata_path().display());
        Ok(entry)
    }

    /// Upload the latest episode and the feed.
    pub async fn upload(&self) -> Result<()> {
        let history = EpisodeHistory::load(&self.config.history_path(), self.config.output.max_episodes);
        let latest = history
            .latest()
            .ok_or_else(|| AppError::Pipeline("No published episodes to upload".to_string()))?;

        let uploader = self.uploader()?;
        let url = uploader.upload_file(Path::new(&latest.episode_file), None).await?;
        println!("Episode uploaded: {}", url);
        self.upload_feed_files(&uploader).await
    }

    /// Drop the episode for `date` from the history and the feed, deleting its
    /// local files and, with `cloud`, its blob.
    pub async fn remove_episode(&self, date: &str, cloud: bool) -> Result<()> {
        let output = &self.config.output;
        let mut history = EpisodeHistory::load(&self.config.history_path(), output.max_episodes);
        let episode_url = history
            .episodes()
            .iter()
            .find(|e| e.date == date)
            .map(|e| e.episode_url.clone());
        if !history.remove(date)? {
            return Err(AppError::Pipeline(format!("No episode found for {}", date)));
        }
        RssGenerator::new(output).write(&self.config.feed_path(), history.episodes())?;
        println!("Removed episode {}", date);

        if cloud {
            let uploader = self.uploader()?;
            match episode_url.as_deref().and_then(|url| uploader.blob_name_for_url(url)) {
                Some(blob) => {
                    if uploader.delete_blob(&blob).await? {
                        println!("Deleted blob {}", blob);
                    } else {
                        println!("Blob {} was already gone", blob);
                    }
                }
                None => println!("Episode {} was not stored in the container", date),
            }
            self.upload_feed_files(&uploader).await?;
        }

        let stats = history.stats();
        println!(
            "History: {} of {} episodes ({} to {})",
            stats.total_episodes,
            stats.max_episodes,
            stats.oldest_episode.as_deref().unwrap_or("-"),
            stats.newest_episode.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    pub async fn test_upload(&self) -> Result<()> {
        let uploader = self.uploader()?;
        if uploader.test_connection().await {
            println!("Connected to container '{}'", self.config.cloud.container_name);
            Ok(())
        } else {
            Err(AppError::Cloud(format!(
                "Could not access container '{}'",
                self.config.cloud.container_name
            )))
        }
    }

    /// Check configuration, credentials and that every feed parses.
    pub async fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        let processing = &self.config.processing;

        if processing.summarizer == SummarizerKind::Openai && self.secrets.openai_api_key.is_none() {
            problems.push("summarizer is openai but OPENAI_API_KEY is not set".to_string());
        }
        if self.config.voice_settings.provider == TtsProviderKind::Minimax
            && (self.secrets.minimax_api_key.is_none() || self.secrets.minimax_group_id.is_none())
        {
            problems.push("provider is minimax but MINIMAX_API_KEY or MINIMAX_GROUP_ID is not set".to_string());
        }
        if self.config.cloud.enabled && self.secrets.azure_connection_string.is_none() {
            problems.push("cloud upload enabled but AZURE_STORAGE_CONNECTION_STRING is not set".to_string());
        }

        let feeds = self.feeds()?;
        let fetcher = FeedFetcher::new()?;
        for feed in &feeds {
            match fetcher.probe(&feed.url).await {
                Ok(count) => println!("  ok    {} ({} items)", feed.url, count),
                Err(e) => {
                    println!("  FAIL  {}", feed.url);
                    problems.push(format!("{}: {}", feed.url, e));
                }
            }
        }

        let chain = ProviderChain::from_config(&self.config.voice_settings, &self.secrets).await?;
        println!("TTS providers: {}", chain.provider_names().join(" -> "));

        if problems.is_empty() {
            println!("Configuration OK ({} feeds)", feeds.len());
            Ok(())
        } else {
            for problem in &problems {
                println!("  - {}", problem);
            }
            Err(AppError::Config(format!("{} problem(s) found", problems.len())))
        }
    }

    pub fn validate_feed(&self, path: Option<PathBuf>) -> Result<()> {
        let path = path.unwrap_or_else(|| self.config.feed_path());
        let report = validate_feed(&path)?;
        println!(
            "{}: {} ({} episodes)",
            path.display(),
            report.title.as_deref().unwrap_or("untitled"),
            report.episodes
        );
        if report.is_valid() {
            println!("Feed is valid");
            Ok(())
        } else {
            for problem in &report.problems {
                println!("  - {}", problem);
            }
            Err(AppError::Pipeline(format!("Feed has {} problem(s)", report.problems.len())))
        }
    }

    pub async fn serve(&self, host: Option<String>, port: Option<u16>) -> Result<()> {
        let host = host.unwrap_or_else(|| self.config.server.host.clone());
        let port = port.unwrap_or(self.config.server.port);
        let state = crate::server::ServerState::from_config(&self.config);
        crate::server::serve(state, &host, port).await
    }
}

/// `episode_2024-01-31.mp3` -> `2024-01-31`.
fn date_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let candidate = stem.rsplit('_').next()?;
    NaiveDate::parse_from_str(candidate, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn describe(date: &str, items: &[PlannedItem]) -> String {
    let heading = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%B %d, %Y").to_string())
        .unwrap_or_else(|_| date.to_string());
    let mut out = format!("Newsletter summary for {}", heading);
    if !items.is_empty() {
        out.push_str("\n\nItems covered:");
        for (i, item) in items.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, item.title));
        }
    }
    out
}

/// Exact length for WAV files, the metadata estimate otherwise.
fn audio_seconds(path: &Path, metadata: &EpisodeMetadata) -> u64 {
    if let Ok(reader) = hound::WavReader::open(path) {
        let spec = reader.spec();
        if spec.sample_rate > 0 {
            return reader.duration() as u64 / spec.sample_rate as u64;
        }
    }
    metadata.estimated_duration_ms / 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{count_words, Notes};

    fn planned(title: &str, script: &str) -> PlannedItem {
        let words = count_words(script);
        PlannedItem {
            title: title.into(),
            script: script.into(),
            sources: vec![format!("https://example.com/{}", title.to_lowercase())],
            notes: Notes::new(),
            word_count: words,
            allocated_words: words,
        }
    }

    fn offline_app(dir: &Path) -> App {
        let mut config = Config::default();
        config.output.directory = dir.to_path_buf();
        config.output.audio_format = AudioFormat::Wav;
        config.output.enhanced_audio = false;
        config.voice_settings.provider = TtsProviderKind::Dummy;
        App::new(config, Secrets::default())
    }

    #[test]
    fn dates_come_from_episode_file_names() {
        assert_eq!(
            date_from_filename(Path::new("out/episode_2024-01-31.mp3")).as_deref(),
            Some("2024-01-31")
        );
        assert_eq!(date_from_filename(Path::new("out/episode.mp3")), None);
    }

    #[test]
    fn descriptions_list_items() {
        let text = describe("2024-01-31", &[planned("Alpha", "a b"), planned("Beta", "c")]);
        assert!(text.starts_with("Newsletter summary for January 31, 2024"));
        assert!(text.ends_with("1. Alpha\n2. Beta"));
    }

    #[tokio::test]
    async fn silent_episode_is_synthesized_and_published() {
        let dir = tempfile::tempdir().unwrap();
        let app = offline_app(dir.path());
        let items = vec![
            planned("Alpha", &vec!["word"; 165].join(" ")),
            planned("Beta", &vec!["word"; 55].join(" ")),
        ];

        let audio = app.synthesize(&items, 2, "2024-01-31").await.unwrap();
        assert_eq!(audio.format, AudioFormat::Wav);
        assert!(audio.path.ends_with("episode_2024-01-31.wav"));

        let entry = app.publish(Some(audio.path.clone()), Some(items), false).await.unwrap();
        assert_eq!(entry.date, "2024-01-31");
        assert_eq!(entry.episode_url, "http://localhost:8000/episode/episode_2024-01-31.wav");
        // 60 s + 20 s of speech plus one 200 ms gap.
        assert_eq!(entry.duration, "01:20");

        assert!(dir.path().join("episode.json").exists());
        assert!(dir.path().join("episode_2024-01-31.json").exists());
        let report = validate_feed(&dir.path().join("feed.xml")).unwrap();
        assert!(report.is_valid(), "{:?}", report.problems);
        assert_eq!(report.episodes, 1);
    }

    #[test]
    fn metadata_copies_share_the_audio_file_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = offline_app(dir.path());
        app.config.output.episode_filename = "daily.mp3".into();
        assert_eq!(
            app.episode_path("2024-01-31", AudioFormat::Wav),
            dir.path().join("daily_2024-01-31.wav")
        );
        assert_eq!(app.dated_metadata_path("2024-01-31"), dir.path().join("daily_2024-01-31.json"));
    }

    #[tokio::test]
    async fn removed_episode_leaves_feed_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let app = offline_app(dir.path());
        let items = vec![planned("Alpha", &vec!["word"; 30].join(" "))];
        for date in ["2024-01-30", "2024-01-31"] {
            let audio = app.synthesize(&items, 1, date).await.unwrap();
            app.publish(Some(audio.path), Some(items.clone()), false).await.unwrap();
        }

        app.remove_episode("2024-01-30", false).await.unwrap();
        assert!(!dir.path().join("episode_2024-01-30.wav").exists());
        assert!(!dir.path().join("episode_2024-01-30.json").exists());
        assert!(dir.path().join("episode_2024-01-31.wav").exists());
        assert_eq!(validate_feed(&dir.path().join("feed.xml")).unwrap().episodes, 1);

        assert!(app.remove_episode("2024-01-30", false).await.is_err());
    }

    #[tokio::test]
    async fn empty_transcript_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = offline_app(dir.path());
        std::fs::write(app.config.script_path(), "InboxCast Episode Script - 2024-01-31\n").unwrap();
        assert!(app.tts(None).await.is_err());
    }

    #[tokio::test]
    async fn publish_without_audio_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = offline_app(dir.path());
        assert!(app.publish(None, None, false).await.is_err());
    }
}
