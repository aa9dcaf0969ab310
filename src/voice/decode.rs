//! Clip decoding and companion rendering
//!
//! Everything is normalized to mono f32 at [`PLAYBACK_SAMPLE_RATE`]. Companion
//! files hold exactly that, as little-endian f32 samples with no header, so
//! they play without decoding or resampling.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::catalog::companion_path;
use crate::{Error, Result};

/// Sample rate for playback and companion files
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Decode a clip to mono f32 samples at the playback rate
///
/// # Errors
///
/// Returns error if the file cannot be read or its format is unsupported
pub fn decode_file(path: &Path) -> Result<Vec<f32>> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pcm" => read_companion(path),
        "wav" | "wave" => decode_wav(path),
        "mp3" => {
            let data = std::fs::read(path)?;
            decode_mp3(&data)
        }
        other => Err(Error::Audio(format!(
            "unsupported clip format '{other}': {}",
            path.display()
        ))),
    }
}

/// Read a companion file's raw samples
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a whole number of samples
pub fn read_companion(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path)?;

    if bytes.len() % 4 != 0 {
        return Err(Error::Audio(format!(
            "truncated companion file: {}",
            path.display()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Render the companion for a clip, returning its path
///
/// # Errors
///
/// Returns error if decoding or writing fails
pub fn precompile(clip: &Path) -> Result<PathBuf> {
    let samples = decode_file(clip)?;
    let target = companion_path(clip);

    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    std::fs::write(&target, bytes)?;

    tracing::debug!(
        clip = %clip.display(),
        companion = %target.display(),
        samples = samples.len(),
        "companion rendered"
    );

    Ok(target)
}

/// Decode WAV with hound
#[allow(clippy::cast_precision_loss)]
fn decode_wav(path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| Error::Audio(format!("cannot open WAV {}: {e}", path.display())))?;

    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| v as f32 / max)
                        .map_err(|e| Error::Audio(format!("WAV read error: {e}")))
                })
                .collect::<Result<Vec<f32>>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| Error::Audio(format!("WAV read error: {e}"))))
            .collect::<Result<Vec<f32>>>()?,
    };

    let mono = downmix(&samples, usize::from(spec.channels));
    resample(mono, spec.sample_rate)
}

/// Decode MP3 bytes to mono f32 samples at the playback rate
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate.get_or_insert(frame.sample_rate);
                let frame_samples: Vec<f32> =
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&frame_samples, frame.channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    let Some(rate) = sample_rate else {
        return Ok(Vec::new());
    };

    let rate = u32::try_from(rate)
        .map_err(|_| Error::Audio(format!("invalid MP3 sample rate: {rate}")))?;
    resample(samples, rate)
}

/// Average interleaved channels down to mono
#[allow(clippy::cast_precision_loss)]
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono audio to the playback rate
fn resample(samples: Vec<f32>, input_rate: u32) -> Result<Vec<f32>> {
    if input_rate == PLAYBACK_SAMPLE_RATE || samples.is_empty() {
        return Ok(samples);
    }

    let ratio = f64::from(PLAYBACK_SAMPLE_RATE) / f64::from(input_rate);
    let mut resampler =
        FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, samples.len(), 1)
            .map_err(|e| Error::Audio(format!("failed to create resampler: {e}")))?;

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| Error::Audio(format!("resampling failed: {e}")))?;

    Ok(output.pop().unwrap_or_default())
}
