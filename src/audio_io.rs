//! WAV file I/O.
//!
//! Native support covers 16/24/32-bit integer and 32-bit float WAV via
//! `hound`. Multi-channel files are downmixed to mono by channel averaging.
//! Other container formats are rejected as unsupported; they belong to an
//! external transcoding step.

use std::path::Path;

use crate::constants::EPSILON;
use crate::error::VoicoError;

/// Peak level output is normalized to before encoding.
pub const TARGET_PEAK: f32 = 0.95;

/// Metadata summary of an audio file, as printed by `--info`.
#[derive(Debug, Clone)]
pub struct AudioInfo {
    pub path: String,
    pub format: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: u64,
    pub duration_seconds: f64,
    pub bits_per_sample: u16,
    pub file_size_bytes: u64,
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn check_wav_extension(path: &Path) -> Result<(), VoicoError> {
    let ext = extension_of(path);
    if ext == "wav" {
        return Ok(());
    }
    Err(VoicoError::UnsupportedFormat {
        message: format!("unsupported audio format: .{ext} ({})", path.display()),
        suggestions: vec![
            "Only WAV is supported natively".to_string(),
            "Transcode FLAC/OGG input with an external tool first".to_string(),
        ],
    })
}

/// Load a WAV file as mono f32 samples in [-1, 1] plus its sample rate.
pub fn load_audio(path: &Path) -> Result<(Vec<f32>, u32), VoicoError> {
    check_wav_extension(path)?;

    let load_err = |message: String| VoicoError::AudioLoad {
        message,
        suggestions: vec![
            "Check that the file exists and is a valid WAV".to_string(),
        ],
    };

    let mut reader = hound::WavReader::open(path)
        .map_err(|e| load_err(format!("failed to open '{}': {e}", path.display())))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| load_err(format!("failed to read '{}': {e}", path.display())))?,
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<_, _>>()
            .map_err(|e| load_err(format!("failed to read '{}': {e}", path.display())))?,
        (hound::SampleFormat::Int, bits @ (24 | 32)) => {
            let scale = 1.0 / (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| load_err(format!("failed to read '{}': {e}", path.display())))?
        }
        (format, bits) => {
            return Err(VoicoError::UnsupportedFormat {
                message: format!("unsupported WAV encoding: {bits}-bit {format:?}"),
                suggestions: vec!["Use 16/24/32-bit PCM or 32-bit float WAV".to_string()],
            });
        }
    };

    let channels = spec.channels.max(1) as usize;
    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((mono, spec.sample_rate))
}

/// Save mono samples as WAV at the requested bit depth (16-bit PCM or
/// 32-bit float).
pub fn save_audio(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
    bit_depth: u16,
) -> Result<(), VoicoError> {
    check_wav_extension(path)?;

    let save_err = |message: String| VoicoError::AudioSave {
        message,
        suggestions: vec!["Check that the output directory exists and is writable".to_string()],
    };

    let spec = match bit_depth {
        16 => hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        },
        32 => hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
        other => {
            return Err(VoicoError::AudioSave {
                message: format!("unsupported WAV bit depth: {other}"),
                suggestions: vec!["Use 16 or 32".to_string()],
            });
        }
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| save_err(format!("failed to create '{}': {e}", path.display())))?;

    if bit_depth == 16 {
        for &v in samples {
            let clamped = v.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * 32767.0).round() as i16)
                .map_err(|e| save_err(format!("write failed: {e}")))?;
        }
    } else {
        for &v in samples {
            writer
                .write_sample(v.clamp(-1.0, 1.0))
                .map_err(|e| save_err(format!("write failed: {e}")))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| save_err(format!("failed to finalize '{}': {e}", path.display())))?;
    Ok(())
}

/// Read file metadata without decoding the sample data.
pub fn audio_info(path: &Path) -> Result<AudioInfo, VoicoError> {
    check_wav_extension(path)?;

    let reader = hound::WavReader::open(path).map_err(|e| VoicoError::AudioLoad {
        message: format!("failed to open '{}': {e}", path.display()),
        suggestions: vec!["Check that the file exists and is a valid WAV".to_string()],
    })?;
    let spec = reader.spec();
    let frames = reader.duration() as u64;
    let file_size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    Ok(AudioInfo {
        path: path.display().to_string(),
        format: extension_of(path),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        frames,
        duration_seconds: frames as f64 / spec.sample_rate.max(1) as f64,
        bits_per_sample: spec.bits_per_sample,
        file_size_bytes,
    })
}

/// Sign-preserving peak normalization; identity on effectively silent input.
pub fn normalize_audio(samples: &[f32], target_peak: f32) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()));
    if peak > EPSILON {
        let gain = target_peak / peak;
        samples.iter().map(|&v| v * gain).collect()
    } else {
        samples.to_vec()
    }
}
