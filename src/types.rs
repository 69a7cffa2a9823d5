//! Analysis data model shared by every pipeline stage.
//!
//! All per-frame vectors inside one [`VoiceProfile`] share a common length
//! after the profile builder's alignment pass. Two-dimensional data is stored
//! row-major: formant tracks as `[formant_index][frame]`, spectral envelopes
//! as `[frame][bin]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-frame fundamental frequency track.
///
/// `f0` holds NaN for unvoiced frames; `f0_mean` is the median over the
/// finite values (150 Hz when none exist).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchContour {
    #[serde(with = "nan_array")]
    pub f0: Vec<f32>,
    pub voiced_mask: Vec<bool>,
    pub f0_mean: f32,
    pub f0_std: f32,
    #[serde(rename = "harmonic_to_noise_ratio")]
    pub hnr_db: f32,
}

impl PitchContour {
    /// Fraction of frames flagged voiced.
    pub fn voiced_ratio(&self) -> f32 {
        if self.f0.is_empty() {
            return 0.0;
        }
        let voiced = self.voiced_mask.iter().filter(|&&v| v).count();
        voiced as f32 / self.f0.len() as f32
    }

    pub fn truncate(&mut self, len: usize) {
        self.f0.truncate(len);
        self.voiced_mask.truncate(len);
    }
}

/// Formant frequency and bandwidth tracks, one row per formant.
///
/// Zero entries mark frames where estimation failed; `mean_frequencies` and
/// `mean_bandwidths` are medians over the non-zero frames of each row, with
/// defaults substituted for empty rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormantTrack {
    pub frequencies: Vec<Vec<f32>>,
    pub bandwidths: Vec<Vec<f32>>,
    pub mean_frequencies: Vec<f32>,
    pub mean_bandwidths: Vec<f32>,
}

impl FormantTrack {
    /// Number of frames per row (0 for an empty track).
    pub fn frame_count(&self) -> usize {
        self.frequencies.first().map_or(0, Vec::len)
    }

    pub fn formant_count(&self) -> usize {
        self.frequencies.len()
    }

    pub fn truncate(&mut self, len: usize) {
        for row in &mut self.frequencies {
            row.truncate(len);
        }
        for row in &mut self.bandwidths {
            row.truncate(len);
        }
    }
}

/// Spectral envelope and tilt of the analyzed signal.
///
/// The envelope is strictly positive (it is the exponential of a smoothed
/// log spectrum), stored `[frame][bin]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralFeatures {
    pub envelope: Vec<Vec<f32>>,
    pub spectral_tilt: f32,
}

impl SpectralFeatures {
    pub fn frame_count(&self) -> usize {
        self.envelope.len()
    }

    pub fn truncate(&mut self, len: usize) {
        self.envelope.truncate(len);
    }
}

/// Complete voice characterization for one speaker recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub pitch: PitchContour,
    pub formants: FormantTrack,
    pub spectral: SpectralFeatures,
    pub harmonic_ratios: Vec<f32>,
    pub harmonic_energy: Vec<f32>,
    pub sample_rate: u32,
}

impl VoiceProfile {
    /// Common frame count after alignment.
    pub fn frame_count(&self) -> usize {
        self.pitch.f0.len()
    }
}

/// Outcome summary of one batch conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub output_path: String,
    pub pitch_shift_applied: f32,
    pub formant_shift_applied: f32,
    pub sample_rate: u32,
    pub input_duration_seconds: f64,
    pub output_duration_seconds: f64,
    pub snr_db: f32,
    pub spectral_centroid_deviation: f32,
    pub stage_timings: BTreeMap<String, f64>,
}

/// Serialize `Vec<f32>` with NaN mapped to JSON null and back.
///
/// `serde_json` cannot represent non-finite floats, and unvoiced frames are
/// encoded as NaN throughout the pitch track.
pub(crate) mod nan_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let mapped: Vec<Option<f32>> = values
            .iter()
            .map(|&v| if v.is_finite() { Some(v) } else { None })
            .collect();
        mapped.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let mapped = Vec::<Option<f32>>::deserialize(deserializer)?;
        Ok(mapped.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
    }
}
