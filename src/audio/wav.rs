//! Minimal canonical WAV handling: a fixed 44-byte RIFF header followed by
//! little-endian 16-bit mono PCM.

use crate::error::{AppError, Result};

pub const HEADER_LEN: usize = 44;
pub const SAMPLE_RATE: u32 = 44_100;

/// Fields of a canonical PCM WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(AppError::Audio(format!(
                "WAV data too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(AppError::Audio("missing RIFF/WAVE signature".to_string()));
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(AppError::Audio("not a canonical 44-byte WAV header".to_string()));
        }

        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        Ok(Self {
            riff_size: u32_at(4),
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }
}

/// Read the PCM body of a WAV blob, assuming a 44-byte header and 16-bit
/// little-endian samples. Short blobs yield no samples and a dangling odd byte
/// is ignored.
pub fn pcm_samples(wav: &[u8]) -> Vec<i16> {
    if wav.len() < HEADER_LEN {
        return Vec::new();
    }
    wav[HEADER_LEN..]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Wrap mono 16-bit samples in a fresh RIFF/WAVE container.
pub fn encode_pcm16_mono(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_size = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(HEADER_LEN + samples.len() * 2);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(data_size + 36).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());

    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_match_encoded_samples() {
        let wav = encode_pcm16_mono(&[1, -1, 300, i16::MIN], SAMPLE_RATE);
        assert_eq!(wav.len(), HEADER_LEN + 8);

        let header = WavHeader::parse(&wav).unwrap();
        assert_eq!(header.sample_rate, 44_100);
        assert_eq!(header.channels, 1);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.data_size, 8);
        assert_eq!(header.riff_size, 44);
        assert_eq!(header.byte_rate, 88_200);
    }

    #[test]
    fn pcm_body_is_read_back() {
        let samples = [0, 1, -2, 32767, -32768];
        assert_eq!(pcm_samples(&encode_pcm16_mono(&samples, 22_050)), samples);
    }

    #[test]
    fn short_blobs_have_no_samples() {
        assert!(pcm_samples(&[0u8; 20]).is_empty());
        assert!(WavHeader::parse(&[0u8; 20]).is_err());
    }

    #[test]
    fn odd_trailing_byte_is_ignored() {
        let mut wav = encode_pcm16_mono(&[5, 6], SAMPLE_RATE);
        wav.push(0x7f);
        assert_eq!(pcm_samples(&wav), vec![5, 6]);
    }

    #[test]
    fn hound_reads_our_container() {
        let wav = encode_pcm16_mono(&[10, 20, 30], SAMPLE_RATE);
        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        assert_eq!(reader.len(), 3);
    }
}
