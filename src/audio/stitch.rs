use tracing::{info, warn};

use super::{decode, dsp, wav};
use crate::config::{AudioFormat, OutputConfig};
use crate::error::{AppError, Result};

const FADE_MS: u32 = 50;
const SEGMENT_TARGET_DB: f32 = -20.0;
const PEAK_CEILING_DB: f32 = -1.0;
const PROGRAMME_TARGET_LUFS: f32 = -16.0;

/// Raw PCM concatenation of canonical 44-byte-header WAV segments.
pub struct SimpleStitcher {
    pub gap_ms: u32,
}

impl SimpleStitcher {
    pub fn new(gap_ms: u32) -> Self {
        Self { gap_ms }
    }

    pub fn stitch(&self, segments: &[Vec<u8>]) -> Vec<u8> {
        if segments.is_empty() {
            return Vec::new();
        }

        let gap_samples = (wav::SAMPLE_RATE as u64 * self.gap_ms as u64 / 1000) as usize;
        let mut samples: Vec<i16> = Vec::new();

        for (i, segment) in segments.iter().enumerate() {
            samples.extend(wav::pcm_samples(segment));
            if i + 1 < segments.len() {
                samples.extend(std::iter::repeat(0i16).take(gap_samples));
            }
        }

        wav::encode_pcm16_mono(&samples, wav::SAMPLE_RATE)
    }
}

/// Decodes any container, then fades, levels and loudness-matches the programme.
pub struct ProfessionalStitcher {
    pub gap_ms: u32,
    pub fade_ms: u32,
    pub sample_rate: u32,
    pub bitrate: String,
    pub format: AudioFormat,
}

impl ProfessionalStitcher {
    pub fn from_config(output: &OutputConfig) -> Self {
        Self {
            gap_ms: output.gap_ms,
            fade_ms: FADE_MS,
            sample_rate: wav::SAMPLE_RATE,
            bitrate: output.bitrate.clone(),
            format: output.audio_format,
        }
    }

    pub fn stitch(&self, segments: &[Vec<u8>]) -> Result<Vec<u8>> {
        let fade_len = (self.sample_rate as u64 * self.fade_ms as u64 / 1000) as usize;
        let gap_len = (self.sample_rate as u64 * self.gap_ms as u64 / 1000) as usize;

        let mut decoded = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            match decode::decode_segment(segment, self.sample_rate) {
                Ok(mut samples) => {
                    dsp::apply_fades(&mut samples, fade_len);
                    dsp::normalize_level(&mut samples, SEGMENT_TARGET_DB, PEAK_CEILING_DB);
                    decoded.push(samples);
                }
                Err(e) => warn!("Skipping segment {}: {}", i + 1, e),
            }
        }

        if decoded.is_empty() {
            return Err(AppError::Audio("no decodable audio segments".to_string()));
        }

        let total: usize = decoded.iter().map(Vec::len).sum::<usize>() + gap_len * (decoded.len() - 1);
        let mut programme = Vec::with_capacity(total);
        let count = decoded.len();
        for (i, samples) in decoded.into_iter().enumerate() {
            programme.extend(samples);
            if i + 1 < count {
                programme.extend(std::iter::repeat(0.0f32).take(gap_len));
            }
        }

        dsp::approximate_loudness(&mut programme, PROGRAMME_TARGET_LUFS, PEAK_CEILING_DB);

        info!(
            "Stitched {} segments: {:.1}s, RMS {:.1} dBFS",
            count,
            programme.len() as f32 / self.sample_rate as f32,
            20.0 * dsp::rms(&programme).max(1e-9).log10()
        );

        match self.format {
            AudioFormat::Wav => decode::encode_wav(&programme, self.sample_rate),
            AudioFormat::Mp3 => decode::encode_mp3(&programme, self.sample_rate, &self.bitrate),
        }
    }
}

/// Audio bytes together with the container they ended up in.
#[derive(Debug, Clone)]
pub struct StitchedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Picks the enhanced stitcher when configured and falls back to plain
/// concatenation when it fails.
pub struct AudioStitcher {
    simple: SimpleStitcher,
    professional: Option<ProfessionalStitcher>,
}

impl AudioStitcher {
    pub fn from_config(output: &OutputConfig) -> Self {
        Self {
            simple: SimpleStitcher::new(output.gap_ms),
            professional: output
                .enhanced_audio
                .then(|| ProfessionalStitcher::from_config(output)),
        }
    }

    pub fn stitch(&self, segments: &[Vec<u8>]) -> StitchedAudio {
        if let Some(professional) = &self.professional {
            match professional.stitch(segments) {
                Ok(bytes) => {
                    return StitchedAudio {
                        bytes,
                        format: professional.format,
                    }
                }
                Err(e) => warn!("Enhanced stitching failed, using basic concatenation: {}", e),
            }
        }

        StitchedAudio {
            bytes: self.simple.stitch(segments),
            format: AudioFormat::Wav,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, value: i16) -> Vec<u8> {
        wav::encode_pcm16_mono(&vec![value; len], wav::SAMPLE_RATE)
    }

    #[test]
    fn no_segments_give_no_bytes() {
        assert!(SimpleStitcher::new(200).stitch(&[]).is_empty());
    }

    #[test]
    fn single_segment_has_no_trailing_gap() {
        let out = SimpleStitcher::new(200).stitch(&[tone(100, 7)]);
        let header = wav::WavHeader::parse(&out).unwrap();
        assert_eq!(header.data_size, 200);
        assert_eq!(wav::pcm_samples(&out), vec![7; 100]);
    }

    #[test]
    fn gaps_sit_between_segments_only() {
        // 200 ms at 44.1 kHz is 8820 samples.
        let out = SimpleStitcher::new(200).stitch(&[tone(10, 1), tone(20, 2), tone(30, 3)]);
        let samples = wav::pcm_samples(&out);
        assert_eq!(samples.len(), 10 + 20 + 30 + 2 * 8820);

        let header = wav::WavHeader::parse(&out).unwrap();
        assert_eq!(header.data_size as usize, samples.len() * 2);
        assert_eq!(header.riff_size, header.data_size + 36);
        assert_eq!(samples[10], 0);
        assert_eq!(samples[10 + 8820], 2);
        assert_eq!(*samples.last().unwrap(), 3);
    }

    #[test]
    fn short_blobs_contribute_nothing() {
        let out = SimpleStitcher::new(0).stitch(&[vec![1, 2, 3], tone(4, 9)]);
        assert_eq!(wav::pcm_samples(&out), vec![9; 4]);
    }

    #[test]
    fn enhanced_wav_output_is_leveled() {
        let stitcher = ProfessionalStitcher {
            gap_ms: 100,
            fade_ms: 5,
            sample_rate: wav::SAMPLE_RATE,
            bitrate: "128k".to_string(),
            format: AudioFormat::Wav,
        };
        let loud: Vec<i16> = (0..4410).map(|i| if i % 2 == 0 { 20_000 } else { -20_000 }).collect();
        let quiet: Vec<i16> = (0..4410).map(|i| if i % 2 == 0 { 200 } else { -200 }).collect();
        let segments = vec![
            wav::encode_pcm16_mono(&loud, wav::SAMPLE_RATE),
            wav::encode_pcm16_mono(&quiet, wav::SAMPLE_RATE),
        ];

        let out = stitcher.stitch(&segments).unwrap();
        let samples = dsp::to_f32(&wav::pcm_samples(&out));
        assert_eq!(samples.len(), 4410 * 2 + 4410);
        assert!(dsp::peak(&samples) <= dsp::db_to_linear(PEAK_CEILING_DB) + 1e-3);

        // Both halves were leveled to the same RMS before the programme pass.
        let first = dsp::rms(&samples[500..3900]);
        let second = dsp::rms(&samples[4410 + 4410 + 500..4410 + 4410 + 3900]);
        assert!((first / second - 1.0).abs() < 0.05);
    }

    #[test]
    fn undecodable_segments_are_skipped() {
        let stitcher = ProfessionalStitcher {
            gap_ms: 0,
            fade_ms: 0,
            sample_rate: wav::SAMPLE_RATE,
            bitrate: "128k".to_string(),
            format: AudioFormat::Wav,
        };
        let garbage = b"RIFFnot really a wave file at all, just bytes".to_vec();
        let out = stitcher.stitch(&[garbage, tone(100, 1000)]).unwrap();
        assert_eq!(wav::pcm_samples(&out).len(), 100);
    }

    #[test]
    fn facade_falls_back_to_wav_when_nothing_decodes() {
        let output = OutputConfig {
            audio_format: AudioFormat::Mp3,
            enhanced_audio: true,
            gap_ms: 0,
            ..OutputConfig::default()
        };
        let result = AudioStitcher::from_config(&output).stitch(&[]);
        assert_eq!(result.format, AudioFormat::Wav);
        assert!(result.bytes.is_empty());
    }

    #[test]
    fn facade_without_enhancement_is_plain_concatenation() {
        let output = OutputConfig {
            enhanced_audio: false,
            gap_ms: 0,
            ..OutputConfig::default()
        };
        let result = AudioStitcher::from_config(&output).stitch(&[tone(3, 5), tone(2, 6)]);
        assert_eq!(result.format, AudioFormat::Wav);
        assert_eq!(wav::pcm_samples(&result.bytes), vec![5, 5, 5, 6, 6]);
    }
}
