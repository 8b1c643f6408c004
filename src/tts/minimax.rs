use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{TtsProvider, VoiceParams};
use crate::config::WORDS_PER_MINUTE;
use crate::error::{AppError, Result};

const MINIMAX_API_URL: &str = "https://api.minimax.io/v1/t2a_v2";
const MINIMAX_MODEL: &str = "speech-02-turbo";
const DEFAULT_VOICE: &str = "female-shaonv";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    text: &'a str,
    stream: bool,
    voice_setting: VoiceSetting<'a>,
    audio_setting: AudioSetting,
}

#[derive(Debug, Serialize)]
struct VoiceSetting<'a> {
    voice_id: &'a str,
    speed: f32,
    vol: f32,
    pitch: i32,
}

#[derive(Debug, Serialize)]
struct AudioSetting {
    sample_rate: u32,
    bitrate: u32,
    format: &'static str,
    channel: u8,
}

impl AudioSetting {
    /// MiniMax tops out at 32 kHz above CD rate and returns the requested container.
    fn for_params(params: &VoiceParams) -> Self {
        Self {
            sample_rate: if params.sample_rate > 44_100 {
                32_000
            } else {
                params.sample_rate
            },
            bitrate: 128_000,
            format: params.format.extension(),
            channel: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpeechResponse {
    data: Option<SpeechData>,
    base_resp: Option<BaseResp>,
}

#[derive(Debug, Deserialize)]
struct SpeechData {
    audio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BaseResp {
    status_code: i64,
    #[serde(default)]
    status_msg: String,
}

/// Map a speaking rate onto MiniMax's 0.5..=2.0 speed multiplier.
pub fn wpm_to_speed(wpm: u32) -> f32 {
    (wpm as f32 / WORDS_PER_MINUTE as f32).clamp(0.5, 2.0)
}

pub struct MiniMaxProvider {
    client: Client,
    api_key: Option<String>,
    group_id: Option<String>,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl MiniMaxProvider {
    pub fn new(api_key: Option<String>, group_id: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            api_key,
            group_id,
            base_url: MINIMAX_API_URL.to_string(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    async fn request_once(&self, body: &SpeechRequest<'_>) -> Result<Vec<u8>> {
        let (Some(api_key), Some(group_id)) = (&self.api_key, &self.group_id) else {
            return Err(AppError::Tts(
                "MINIMAX_API_KEY and MINIMAX_GROUP_ID must be set".to_string(),
            ));
        };

        let response = self
            .client
            .post(&self.base_url)
            .query(&[("GroupId", group_id)])
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Tts(format!("MiniMax HTTP {}: {}", status, error_text)));
        }

        let parsed: SpeechResponse = response.json().await?;
        decode_response(parsed)
    }
}

fn decode_response(response: SpeechResponse) -> Result<Vec<u8>> {
    if let Some(base) = &response.base_resp {
        if base.status_code != 0 {
            let msg = if base.status_msg.is_empty() {
                "Unknown API error"
            } else {
                base.status_msg.as_str()
            };
            return Err(AppError::Tts(format!("MiniMax error {}: {}", base.status_code, msg)));
        }
    }

    let audio_hex = response
        .data
        .and_then(|d| d.audio)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AppError::Tts("No audio data in MiniMax response".to_string()))?;

    hex::decode(audio_hex.trim())
        .map_err(|e| AppError::Tts(format!("invalid hex audio payload: {}", e)))
}

#[async_trait]
impl TtsProvider for MiniMaxProvider {
    fn name(&self) -> &'static str {
        "minimax"
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some() && self.group_id.is_some()
    }

    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>> {
        let voice_id = if params.voice == "default" {
            DEFAULT_VOICE
        } else {
            params.voice.as_str()
        };

        let body = SpeechRequest {
            model: MINIMAX_MODEL,
            text,
            stream: false,
            voice_setting: VoiceSetting {
                voice_id,
                speed: wpm_to_speed(params.wpm),
                vol: 1.0,
                pitch: 0,
            },
            audio_setting: AudioSetting::for_params(params),
        };

        let mut backoff = ExponentialBackoff {
            current_interval: self.retry_delay,
            initial_interval: self.retry_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.retry_delay * 32,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            match self.request_once(&body).await {
                Ok(audio) => return Ok(audio),
                Err(e) if attempt < self.max_retries => {
                    let delay = backoff.next_backoff().unwrap_or(self.retry_delay);
                    warn!(
                        "MiniMax request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
