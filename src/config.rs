//! Conversion quality presets.
//!
//! A preset trades processing time against output fidelity. All DSP stages
//! read their tuning from [`QualitySettings`]; nothing else is configurable
//! per conversion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, VoicoError};

// =============================================================================
// Quality presets
// =============================================================================

/// Named processing quality tiers, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionQuality {
    Turbo,
    Fast,
    Balanced,
    High,
    Ultra,
    Master,
}

impl ConversionQuality {
    pub fn all() -> [ConversionQuality; 6] {
        [
            ConversionQuality::Turbo,
            ConversionQuality::Fast,
            ConversionQuality::Balanced,
            ConversionQuality::High,
            ConversionQuality::Ultra,
            ConversionQuality::Master,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConversionQuality::Turbo => "turbo",
            ConversionQuality::Fast => "fast",
            ConversionQuality::Balanced => "balanced",
            ConversionQuality::High => "high",
            ConversionQuality::Ultra => "ultra",
            ConversionQuality::Master => "master",
        }
    }
}

impl Default for ConversionQuality {
    fn default() -> Self {
        ConversionQuality::Balanced
    }
}

impl fmt::Display for ConversionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConversionQuality {
    type Err = VoicoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "turbo" => Ok(ConversionQuality::Turbo),
            "fast" => Ok(ConversionQuality::Fast),
            "balanced" => Ok(ConversionQuality::Balanced),
            "high" => Ok(ConversionQuality::High),
            "ultra" => Ok(ConversionQuality::Ultra),
            "master" => Ok(ConversionQuality::Master),
            other => Err(ConversionError::Validation {
                message: format!("unknown quality preset: {other}"),
                suggestions: vec![
                    "Valid presets: turbo, fast, balanced, high, ultra, master".to_string(),
                ],
            }
            .into()),
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Resolved tuning values for one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    /// STFT hop is `n_fft / hop_divisor`.
    pub hop_divisor: usize,
    /// Iteration count for Griffin-Lim phase reconstruction.
    pub griffin_lim_iters: usize,
    /// Median kernel applied to formant tracks (forced odd).
    pub envelope_smoothing: usize,
    /// Base LPC order for formant tracking.
    pub formant_tracking_order: usize,
    /// 0..1, scales the cepstral envelope truncation width.
    pub spectral_detail_preservation: f32,
    /// Reconstruct phase from magnitude instead of reusing the input phase.
    pub use_advanced_phase: bool,
    /// Apply the magnitude-domain formant warp after pitch shifting.
    pub use_formant_correction: bool,
}

impl QualitySettings {
    pub fn from_preset(quality: ConversionQuality) -> Self {
        match quality {
            ConversionQuality::Turbo => Self {
                hop_divisor: 2,
                griffin_lim_iters: 16,
                envelope_smoothing: 9,
                formant_tracking_order: 14,
                spectral_detail_preservation: 0.15,
                use_advanced_phase: false,
                use_formant_correction: false,
            },
            ConversionQuality::Fast => Self {
                hop_divisor: 4,
                griffin_lim_iters: 32,
                envelope_smoothing: 5,
                formant_tracking_order: 14,
                spectral_detail_preservation: 0.2,
                use_advanced_phase: false,
                use_formant_correction: true,
            },
            ConversionQuality::Balanced => Self {
                hop_divisor: 4,
                griffin_lim_iters: 64,
                envelope_smoothing: 3,
                formant_tracking_order: 14,
                spectral_detail_preservation: 0.3,
                use_advanced_phase: true,
                use_formant_correction: true,
            },
            ConversionQuality::High => Self {
                hop_divisor: 4,
                griffin_lim_iters: 100,
                envelope_smoothing: 2,
                formant_tracking_order: 14,
                spectral_detail_preservation: 0.4,
                use_advanced_phase: true,
                use_formant_correction: true,
            },
            ConversionQuality::Ultra => Self {
                hop_divisor: 8,
                griffin_lim_iters: 200,
                envelope_smoothing: 1,
                formant_tracking_order: 14,
                spectral_detail_preservation: 0.5,
                use_advanced_phase: true,
                use_formant_correction: true,
            },
            ConversionQuality::Master => Self {
                hop_divisor: 8,
                griffin_lim_iters: 500,
                envelope_smoothing: 1,
                formant_tracking_order: 16,
                spectral_detail_preservation: 0.6,
                use_advanced_phase: true,
                use_formant_correction: true,
            },
        }
    }

    /// Reject settings a preset could never produce. Custom settings go
    /// through here before the pipeline accepts them.
    pub fn validate(&self) -> Result<(), VoicoError> {
        let mut issues = Vec::new();
        if self.hop_divisor == 0 {
            issues.push(format!("hop_divisor must be > 0, got {}", self.hop_divisor));
        }
        if self.griffin_lim_iters == 0 {
            issues.push(format!(
                "griffin_lim_iters must be > 0, got {}",
                self.griffin_lim_iters
            ));
        }
        if self.envelope_smoothing == 0 {
            issues.push(format!(
                "envelope_smoothing must be > 0, got {}",
                self.envelope_smoothing
            ));
        }
        if self.formant_tracking_order == 0 {
            issues.push(format!(
                "formant_tracking_order must be > 0, got {}",
                self.formant_tracking_order
            ));
        }
        if !(0.0..=1.0).contains(&self.spectral_detail_preservation) {
            issues.push(format!(
                "spectral_detail_preservation must be in [0, 1], got {}",
                self.spectral_detail_preservation
            ));
        }
        if let Some(first) = issues.first() {
            return Err(ConversionError::Validation {
                message: first.clone(),
                suggestions: vec!["Use QualitySettings::from_preset for known-good values".to_string()],
            }
            .into());
        }
        Ok(())
    }

    /// STFT hop length for a given FFT size.
    pub fn hop_length(&self, n_fft: usize) -> usize {
        (n_fft / self.hop_divisor).max(1)
    }

    /// Cepstral truncation width. Scales with detail preservation and lands
    /// on 20 quefrency bins at the balanced preset.
    pub fn cepstral_coeffs(&self) -> usize {
        let width = (self.spectral_detail_preservation * 200.0 / 3.0).round() as i64;
        width.clamp(8, 48) as usize
    }

    /// Median kernel for formant track smoothing, forced odd.
    pub fn formant_median_kernel(&self) -> usize {
        self.envelope_smoothing | 1
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self::from_preset(ConversionQuality::Balanced)
    }
}
