//! Text-to-speech providers and the ordered fallback chain over them.

mod espeak;
mod minimax;
mod silence;

pub use espeak::EspeakProvider;
pub use minimax::MiniMaxProvider;
pub use silence::SilenceProvider;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{AudioFormat, Secrets, TtsProviderKind, VoiceConfig};
use crate::error::{AppError, Result};
use crate::models::count_words;

/// Voice parameters for a single synthesis call.
#[derive(Debug, Clone)]
pub struct VoiceParams {
    pub voice: String,
    pub wpm: u32,
    pub sample_rate: u32,
    pub format: AudioFormat,
}

impl VoiceParams {
    pub fn from_config(voice: &VoiceConfig, sample_rate: u32, format: AudioFormat) -> Self {
        Self {
            voice: voice.voice_id.clone(),
            wpm: voice.wpm,
            sample_rate,
            format,
        }
    }
}

#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap runtime probe. Unavailable providers are left out of the chain.
    async fn is_available(&self) -> bool;

    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>>;
}

/// Spoken duration in seconds of `text` at `wpm` words per minute.
pub fn estimate_duration(text: &str, wpm: u32) -> f64 {
    if wpm == 0 {
        return 0.0;
    }
    count_words(text) as f64 / wpm as f64 * 60.0
}

pub struct ProviderChain {
    providers: Vec<Box<dyn TtsProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn TtsProvider>>) -> Self {
        Self { providers }
    }

    /// Build the fallback order for the configured provider and drop whatever
    /// is not usable on this machine. Silence is always last and always works.
    pub async fn from_config(voice: &VoiceConfig, secrets: &Secrets) -> Result<Self> {
        let mut candidates: Vec<Box<dyn TtsProvider>> = Vec::new();
        match voice.provider {
            TtsProviderKind::Minimax => {
                candidates.push(Box::new(MiniMaxProvider::new(
                    secrets.minimax_api_key.clone(),
                    secrets.minimax_group_id.clone(),
                )?));
                candidates.push(Box::new(EspeakProvider::new()));
            }
            TtsProviderKind::Espeak => candidates.push(Box::new(EspeakProvider::new())),
            TtsProviderKind::Dummy => {}
        }
        candidates.push(Box::new(SilenceProvider));

        let mut providers = Vec::with_capacity(candidates.len());
        for provider in candidates {
            if provider.is_available().await {
                providers.push(provider);
            } else {
                warn!("TTS provider {} is not available, skipping", provider.name());
            }
        }

        let chain = Self::new(providers);
        info!("TTS providers: {}", chain.provider_names().join(" -> "));
        Ok(chain)
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Try each provider in order; an error or an empty payload moves on to
    /// the next one.
    pub async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>> {
        for provider in &self.providers {
            match provider.synthesize(text, params).await {
                Ok(audio) if !audio.is_empty() => {
                    debug!("{} produced {} bytes", provider.name(), audio.len());
                    return Ok(audio);
                }
                Ok(_) => warn!("{} returned no audio, trying next provider", provider.name()),
                Err(e) => warn!("{} failed: {}, trying next provider", provider.name(), e),
            }
        }
        Err(AppError::Tts("all TTS providers failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        name: &'static str,
        reply: Option<Vec<u8>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TtsProvider for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn synthesize(&self, _text: &str, _params: &VoiceParams) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| AppError::Tts(format!("{} is down", self.name)))
        }
    }

    fn params() -> VoiceParams {
        VoiceParams {
            voice: "default".into(),
            wpm: 165,
            sample_rate: 44_100,
            format: AudioFormat::Wav,
        }
    }

    #[test]
    fn duration_is_words_over_rate() {
        assert_eq!(estimate_duration("one two three", 180), 1.0);
        assert_eq!(estimate_duration("", 165), 0.0);
        assert_eq!(estimate_duration("words", 0), 0.0);
    }

    #[test]
    fn chain_falls_through_errors_and_empty_output() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = ProviderChain::new(vec![
            Box::new(Scripted { name: "broken", reply: None, calls: calls.clone() }),
            Box::new(Scripted { name: "mute", reply: Some(Vec::new()), calls: calls.clone() }),
            Box::new(Scripted { name: "good", reply: Some(vec![1, 2, 3]), calls: calls.clone() }),
            Box::new(Scripted { name: "unused", reply: Some(vec![9]), calls: calls.clone() }),
        ]);

        let audio = tokio_test::block_on(chain.synthesize("hello", &params())).unwrap();
        assert_eq!(audio, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausted_chain_is_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = ProviderChain::new(vec![Box::new(Scripted {
            name: "broken",
            reply: None,
            calls,
        })]);
        let err = tokio_test::block_on(chain.synthesize("hello", &params())).unwrap_err();
        assert!(matches!(err, AppError::Tts(_)));
    }

    #[tokio::test]
    async fn dummy_config_builds_silence_only() {
        let voice = VoiceConfig {
            provider: TtsProviderKind::Dummy,
            ..VoiceConfig::default()
        };
        let chain = ProviderChain::from_config(&voice, &Secrets::default()).await.unwrap();
        assert_eq!(chain.provider_names(), vec!["silence"]);
    }

    #[tokio::test]
    async fn minimax_without_credentials_is_probed_out() {
        let voice = VoiceConfig {
            provider: TtsProviderKind::Minimax,
            ..VoiceConfig::default()
        };
        let chain = ProviderChain::from_config(&voice, &Secrets::default()).await.unwrap();
        let names = chain.provider_names();
        assert!(!names.contains(&"minimax"));
        assert_eq!(names.last(), Some(&"silence"));
    }
}
