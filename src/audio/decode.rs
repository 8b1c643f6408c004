use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use super::dsp;
use crate::error::{AppError, Result};

/// Decode an encoded segment of unknown container to mono f32 at `sample_rate`.
///
/// Non-RIFF blobs are tried as MP3 first, then as WAV, then handed to ffmpeg
/// without a format hint. RIFF blobs go straight to the WAV reader.
pub fn decode_segment(bytes: &[u8], sample_rate: u32) -> Result<Vec<f32>> {
    if bytes.is_empty() {
        return Err(AppError::Audio("empty audio segment".to_string()));
    }

    if !bytes.starts_with(b"RIFF") {
        match decode_with_ffmpeg(bytes, Some("mp3"), sample_rate) {
            Ok(samples) => return Ok(samples),
            Err(e) => debug!("MP3 decode failed: {}", e),
        }
    }

    match decode_wav(bytes, sample_rate) {
        Ok(samples) => return Ok(samples),
        Err(e) => debug!("WAV decode failed: {}", e),
    }

    decode_with_ffmpeg(bytes, None, sample_rate)
}

pub fn decode_wav(bytes: &[u8], sample_rate: u32) -> Result<Vec<f32>> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let max = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let mono = dsp::downmix(&interleaved, spec.channels as usize);
    dsp::resample(mono, spec.sample_rate, sample_rate)
}

/// Decode via an ffmpeg subprocess to raw s16le mono at `sample_rate`.
fn decode_with_ffmpeg(bytes: &[u8], format: Option<&str>, sample_rate: u32) -> Result<Vec<f32>> {
    let rate = sample_rate.to_string();
    let mut args: Vec<&str> = vec!["-nostdin", "-hide_banner", "-loglevel", "error"];
    if let Some(format) = format {
        args.extend(["-f", format]);
    }
    args.extend([
        "-i", "pipe:0", "-f", "s16le", "-acodec", "pcm_s16le", "-ac", "1", "-ar", rate.as_str(), "pipe:1",
    ]);

    let stdout = run_ffmpeg(&args, bytes)?;
    if stdout.is_empty() {
        return Err(AppError::Audio("ffmpeg produced no output".to_string()));
    }

    let samples: Vec<i16> = stdout
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(dsp::to_f32(&samples))
}

pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in dsp::to_i16(samples) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

pub fn encode_mp3(samples: &[f32], sample_rate: u32, bitrate: &str) -> Result<Vec<u8>> {
    let pcm: Vec<u8> = dsp::to_i16(samples)
        .into_iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();

    let rate = sample_rate.to_string();
    let args = [
        "-nostdin", "-hide_banner", "-loglevel", "error", "-f", "s16le", "-ar", rate.as_str(), "-ac", "1",
        "-i", "pipe:0", "-codec:a", "libmp3lame", "-b:a", bitrate, "-f", "mp3", "pipe:1",
    ];
    let out = run_ffmpeg(&args, &pcm)?;
    if out.is_empty() {
        return Err(AppError::Audio("ffmpeg produced an empty MP3".to_string()));
    }
    Ok(out)
}

fn run_ffmpeg(args: &[&str], input: &[u8]) -> Result<Vec<u8>> {
    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::Audio("ffmpeg not found (install with: apt install ffmpeg)".to_string())
            } else {
                AppError::Audio(format!("failed to run ffmpeg: {}", e))
            }
        })?;

    // Feed stdin from a separate thread so a full stdout pipe cannot deadlock us.
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Audio("ffmpeg stdin unavailable".to_string()))?;
    let input = input.to_vec();
    let writer = std::thread::spawn(move || stdin.write_all(&input));

    let output = child.wait_with_output()?;
    match writer.join() {
        Ok(Ok(())) => {}
        // ffmpeg may stop reading early once it has rejected the input.
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(AppError::Audio("ffmpeg stdin writer panicked".to_string())),
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Audio(format!("ffmpeg failed: {}", stderr.trim())));
    }
    Ok(output.stdout)
}
