use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{TtsProvider, VoiceParams};
use crate::error::{AppError, Result};

/// Local `espeak` binary writing a WAV file.
pub struct EspeakProvider {
    binary: String,
}

impl EspeakProvider {
    pub fn new() -> Self {
        Self {
            binary: "espeak".to_string(),
        }
    }
}

impl Default for EspeakProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtsProvider for EspeakProvider {
    fn name(&self) -> &'static str {
        "espeak"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>> {
        let scratch = tempfile::Builder::new()
            .prefix("inboxcast-espeak-")
            .suffix(".wav")
            .tempfile()?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-s")
            .arg(params.wpm.to_string())
            .arg("-w")
            .arg(scratch.path());
        if params.voice != "default" {
            cmd.arg("-v").arg(&params.voice);
        }
        cmd.arg(text);

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::Tts("espeak not found (install with: apt install espeak)".to_string())
            } else {
                AppError::Tts(format!("failed to run espeak: {}", e))
            }
        })?;

        if !output.status.success() {
            return Err(AppError::Tts(format!(
                "espeak failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(tokio::fs::read(scratch.path()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioFormat;

    #[tokio::test]
    async fn missing_binary_is_unavailable_and_errors() {
        let provider = EspeakProvider {
            binary: "/nonexistent/espeak".to_string(),
        };
        assert!(!provider.is_available().await);

        let params = VoiceParams {
            voice: "en-us".into(),
            wpm: 165,
            sample_rate: 44_100,
            format: AudioFormat::Wav,
        };
        let err = provider.synthesize("hello", &params).await.unwrap_err();
        assert!(matches!(err, AppError::Tts(_)));
    }
}
