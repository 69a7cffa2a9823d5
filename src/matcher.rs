//! Profile-to-profile matching.
//!
//! Compares a source and target [`VoiceProfile`] and derives the pitch
//! shift (semitones) and formant warp factor that move the source towards
//! the target. Degenerate inputs fall back to neutral values with a logged
//! warning rather than failing the conversion.

use crate::constants::EPSILON;
use crate::dsp::math::median;
use crate::types::VoiceProfile;

/// Formant factors outside this range sound unnatural and are clamped.
const FORMANT_FACTOR_RANGE: (f32, f32) = (0.5, 2.0);

/// Formant rows compared between the profiles (F1..F3 carry the identity).
const MATCHED_FORMANTS: usize = 3;

pub struct VoiceMatcher;

impl VoiceMatcher {
    /// Optimal `(pitch_shift_semitones, formant_shift_factor)` to convert
    /// `source` into `target`.
    pub fn match_profiles(source: &VoiceProfile, target: &VoiceProfile) -> (f32, f32) {
        let semitones = if source.pitch.f0_mean > 0.0 && target.pitch.f0_mean > 0.0 {
            12.0 * (target.pitch.f0_mean / source.pitch.f0_mean).log2()
        } else {
            log::warn!("invalid pitch means, defaulting to 0 semitones");
            0.0
        };

        let src = &source.formants.mean_frequencies;
        let tgt = &target.formants.mean_frequencies;
        let n = src.len().min(tgt.len()).min(MATCHED_FORMANTS);
        let formant_factor = if n > 0 {
            let ratios: Vec<f32> = (0..n).map(|i| tgt[i] / (src[i] + EPSILON)).collect();
            median(&ratios).clamp(FORMANT_FACTOR_RANGE.0, FORMANT_FACTOR_RANGE.1)
        } else {
            1.0
        };

        log::info!(
            "auto-match result: shift {semitones:.2} st, formant factor {formant_factor:.2}x"
        );
        (semitones, formant_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormantTrack, PitchContour, SpectralFeatures};

    fn profile(f0_mean: f32, formants: &[f32]) -> VoiceProfile {
        VoiceProfile {
            pitch: PitchContour {
                f0: vec![f0_mean; 4],
                voiced_mask: vec![true; 4],
                f0_mean,
                f0_std: 0.0,
                hnr_db: 20.0,
            },
            formants: FormantTrack {
                frequencies: formants.iter().map(|&f| vec![f; 4]).collect(),
                bandwidths: formants.iter().map(|_| vec![100.0; 4]).collect(),
                mean_frequencies: formants.to_vec(),
                mean_bandwidths: vec![100.0; formants.len()],
            },
            spectral: SpectralFeatures {
                envelope: vec![vec![1.0; 8]; 4],
                spectral_tilt: 0.0,
            },
            harmonic_ratios: vec![0.8; 4],
            harmonic_energy: vec![1.0; 4],
            sample_rate: 44100,
        }
    }

    #[test]
    fn test_self_match_is_neutral() {
        let p = profile(150.0, &[500.0, 1500.0, 2500.0, 3500.0, 4500.0]);
        let (st, factor) = VoiceMatcher::match_profiles(&p, &p);
        assert!(st.abs() < 1e-2);
        assert!((factor - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_octave_up_is_twelve_semitones() {
        let src = profile(100.0, &[500.0, 1500.0, 2500.0]);
        let tgt = profile(200.0, &[500.0, 1500.0, 2500.0]);
        let (st, _) = VoiceMatcher::match_profiles(&src, &tgt);
        assert!((st - 12.0).abs() < 0.01, "semitones {st}");
    }

    #[test]
    fn test_formant_factor_clamped_to_two() {
        let src = profile(150.0, &[500.0, 1500.0, 2500.0]);
        let tgt = profile(150.0, &[5000.0, 15000.0, 25000.0]);
        let (_, factor) = VoiceMatcher::match_profiles(&src, &tgt);
        assert_eq!(factor, 2.0);
    }

    #[test]
    fn test_invalid_pitch_defaults_to_zero() {
        let mut src = profile(150.0, &[500.0, 1500.0, 2500.0]);
        src.pitch.f0_mean = 0.0;
        let tgt = profile(200.0, &[500.0, 1500.0, 2500.0]);
        let (st, _) = VoiceMatcher::match_profiles(&src, &tgt);
        assert_eq!(st, 0.0);
    }

    #[test]
    fn test_empty_formants_default_to_unity() {
        let src = profile(150.0, &[]);
        let tgt = profile(150.0, &[]);
        let (_, factor) = VoiceMatcher::match_profiles(&src, &tgt);
        assert_eq!(factor, 1.0);
    }
}
