//! Audio sample preparation shared by the transcription backends
//!
//! Backends take arbitrary input (raw s16le PCM at any rate/channel count,
//! or an encoded WAV blob) and all want the same thing: f32 samples, mono,
//! 16 kHz. The conversions live here so each backend only implements
//! inference.

use crate::error::TranscribeError;
use std::io::Cursor;

/// Sample rate expected by every supported inference engine
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Convert little-endian signed 16-bit PCM bytes to f32 samples in [-1, 1]
pub fn pcm_to_f32(pcm: &[u8]) -> Result<Vec<f32>, TranscribeError> {
    if pcm.len() % 2 != 0 {
        return Err(TranscribeError::AudioFormat(format!(
            "PCM byte count {} is not a multiple of the 16-bit sample size",
            pcm.len()
        )));
    }

    Ok(pcm
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect())
}

/// Mix interleaved multi-channel samples down to mono by frame averaging
pub fn downmix(samples: &[f32], channels: u16) -> Result<Vec<f32>, TranscribeError> {
    match channels {
        0 => Err(TranscribeError::AudioFormat(
            "Channel count must be at least 1".to_string(),
        )),
        1 => Ok(samples.to_vec()),
        n => Ok(samples
            .chunks(n as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()),
    }
}

/// Simple linear resampling
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            break;
        };
        output.push(sample);
    }

    output
}

/// Downmix and resample to mono 16 kHz, the format every engine expects
pub fn prepare(
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<f32>, TranscribeError> {
    let mono = downmix(samples, channels)?;
    Ok(resample(&mono, sample_rate, TARGET_SAMPLE_RATE))
}

/// Decode an in-memory WAV blob to f32 samples plus its spec
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32, u16), TranscribeError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| TranscribeError::AudioFormat(format!("WAV decode failed: {}", e)))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .collect(),
    };

    Ok((samples, spec.sample_rate, spec.channels))
}
