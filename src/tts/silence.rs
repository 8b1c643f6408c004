use async_trait::async_trait;

use super::{estimate_duration, TtsProvider, VoiceParams};
use crate::audio::wav;
use crate::error::Result;

/// Emits zero-valued PCM lasting exactly as long as the text would take to read.
pub struct SilenceProvider;

#[async_trait]
impl TtsProvider for SilenceProvider {
    fn name(&self) -> &'static str {
        "silence"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>> {
        let duration = estimate_duration(text, params.wpm);
        let num_samples = (duration * params.sample_rate as f64) as usize;
        Ok(wav::encode_pcm16_mono(&vec![0i16; num_samples], params.sample_rate))
    }
}
