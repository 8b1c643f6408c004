use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::error::{AppError, Result};

/// Below this level a signal is treated as silent and left untouched.
const MIN_RMS: f32 = 1e-6;

pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().copied().map(f32::abs).fold(0.0f32, f32::max)
}

/// Linear fade-in over the first `fade_len` samples and fade-out over the last.
/// Segments shorter than two fades get half of their length for each ramp.
pub fn apply_fades(samples: &mut [f32], fade_len: usize) {
    let fade_len = fade_len.min(samples.len() / 2);
    if fade_len == 0 {
        return;
    }

    let len = samples.len();
    for i in 0..fade_len {
        let gain = i as f32 / fade_len as f32;
        samples[i] *= gain;
        samples[len - 1 - i] *= gain;
    }
}

/// Scale so the peak sits at `ceiling_db` dBFS, only if it is above it.
pub fn limit_peak(samples: &mut [f32], ceiling_db: f32) {
    let ceiling = db_to_linear(ceiling_db);
    let current = peak(samples);
    if current > ceiling {
        let scale = ceiling / current;
        for s in samples.iter_mut() {
            *s *= scale;
        }
    }
}

/// Bring the RMS level to `target_db` dBFS, then keep the peak under
/// `ceiling_db` so the gain never clips.
pub fn normalize_level(samples: &mut [f32], target_db: f32, ceiling_db: f32) {
    let current = rms(samples);
    if current < MIN_RMS {
        debug!("segment is silent, skipping normalization");
        return;
    }

    let gain = db_to_linear(target_db) / current;
    for s in samples.iter_mut() {
        *s *= gain;
    }
    limit_peak(samples, ceiling_db);
}

/// Amplitude pass toward a broadcast loudness target.
///
/// This treats the integrated loudness as the plain RMS level of the whole
/// programme. Real LUFS measurement (K-weighting, 400 ms gating) is not
/// performed, so the result only approximates `target_lufs`.
pub fn approximate_loudness(samples: &mut [f32], target_lufs: f32, ceiling_db: f32) {
    normalize_level(samples, target_lufs, ceiling_db);
}

pub fn to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
        .collect()
}

/// Average interleaved frames down to one channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

pub fn resample(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples);
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| AppError::Audio(format!("resampler setup failed: {}", e)))?;
    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| AppError::Audio(format!("resampling failed: {}", e)))?;

    Ok(output.pop().unwrap_or_default())
}
