//! Validation gates for analyzed profiles.
//!
//! Each gate inspects one aspect of a [`VoiceProfile`] and returns a pass
//! flag, a 0-100 score, the issues found and recovery suggestions. A gate
//! with zero analysis frames fails outright: nothing downstream can work
//! with an empty profile.

use crate::constants::{MAX_F0_HZ, MAX_FORMANT_BANDWIDTH, MIN_F0_HZ};
use crate::types::{FormantTrack, PitchContour, VoiceProfile};

/// Outcome of one validation gate.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub passed: bool,
    pub score: f32,
    pub issues: Vec<String>,
    pub recovery_suggestions: Vec<String>,
}

impl ValidationResult {
    fn empty_input(what: &str) -> Self {
        ValidationResult {
            passed: false,
            score: 0.0,
            issues: vec![format!("no {what} frames to validate")],
            recovery_suggestions: vec![
                "Input may be shorter than one analysis frame".to_string(),
                "Provide at least a few hundred milliseconds of audio".to_string(),
            ],
        }
    }

    fn from_score(score: f32, issues: Vec<String>, suggestions: Vec<String>) -> Self {
        ValidationResult {
            passed: issues.is_empty(),
            score: score.max(0.0),
            issues,
            recovery_suggestions: suggestions,
        }
    }
}

// =============================================================================
// Pitch gate
// =============================================================================

pub struct PitchGate;

impl PitchGate {
    pub fn validate(pitch: &PitchContour) -> ValidationResult {
        let total_frames = pitch.f0.len();
        if total_frames == 0 {
            return ValidationResult::empty_input("pitch");
        }

        let mut issues = Vec::new();
        let mut suggestions = Vec::new();
        let mut score = 100.0f32;

        let voiced_ratio = pitch.voiced_ratio();
        if voiced_ratio < 0.2 {
            issues.push(format!(
                "Low voiced ratio: {:.0}% (minimum: 20%)",
                voiced_ratio * 100.0
            ));
            suggestions.push("Input may be noisy, whispered, or unvoiced speech".to_string());
            suggestions.push("Ensure clean audio without background noise".to_string());
            score -= 40.0;
        }

        let finite_count = pitch.f0.iter().filter(|v| v.is_finite()).count();
        let nan_ratio = 1.0 - finite_count as f32 / total_frames as f32;
        if nan_ratio > 0.3 {
            issues.push(format!(
                "High undetected-pitch count: {:.0}% (maximum: 30%)",
                nan_ratio * 100.0
            ));
            suggestions.push("Audio contains undetected pitch regions".to_string());
            suggestions.push("Try manual pitch shift instead of auto-matching".to_string());
            score -= 30.0;
        }

        if finite_count > 0 {
            let out_of_range = pitch
                .f0
                .iter()
                .filter(|v| v.is_finite())
                .filter(|&&v| v < MIN_F0_HZ || v > MAX_F0_HZ)
                .count();
            let out_ratio = out_of_range as f32 / finite_count as f32;
            if out_ratio > 0.1 {
                issues.push(format!("Out-of-range F0 values: {:.0}%", out_ratio * 100.0));
                suggestions.push("May be synthesized or modified audio".to_string());
                score -= 20.0;
            }
        }

        ValidationResult::from_score(score, issues, suggestions)
    }
}

// =============================================================================
// Formant gate
// =============================================================================

pub struct FormantGate;

impl FormantGate {
    pub fn validate(formants: &FormantTrack) -> ValidationResult {
        if formants.frame_count() == 0 {
            return ValidationResult::empty_input("formant");
        }

        let mut issues = Vec::new();
        let mut suggestions = Vec::new();
        let mut score = 100.0f32;

        let num_formants = formants.formant_count();
        if num_formants < 3 {
            issues.push(format!("Only {num_formants} formants tracked (need 4-5)"));
            suggestions.push("Try increasing the formant tracking order".to_string());
            suggestions.push("Ensure audio has sufficient spectral content".to_string());
            score -= 50.0;
        }

        // Ordering check over the raw per-row frame means (zeros included:
        // a row that never resolved drags its mean down and is flagged).
        let row_means: Vec<f32> = formants
            .frequencies
            .iter()
            .map(|row| {
                if row.is_empty() {
                    0.0
                } else {
                    row.iter().sum::<f32>() / row.len() as f32
                }
            })
            .collect();
        for i in 0..row_means.len().saturating_sub(1) {
            if row_means[i] >= row_means[i + 1] {
                issues.push(format!(
                    "Formant ordering violation at F{} >= F{}",
                    i + 1,
                    i + 2
                ));
                suggestions.push("May indicate low SNR or algorithm instability".to_string());
                score -= 25.0;
                break;
            }
        }

        let mut invalid = 0usize;
        let mut total = 0usize;
        for row in &formants.bandwidths {
            for &bw in row {
                total += 1;
                if !(bw > 10.0 && bw < MAX_FORMANT_BANDWIDTH) {
                    invalid += 1;
                }
            }
        }
        if total > 0 {
            let invalid_ratio = invalid as f32 / total as f32;
            if invalid_ratio > 0.2 {
                issues.push(format!(
                    "Invalid bandwidths: {:.0}% of values",
                    invalid_ratio * 100.0
                ));
                suggestions.push("LPC model may be poorly fitted".to_string());
                score -= 20.0;
            }
        }

        ValidationResult::from_score(score, issues, suggestions)
    }
}

// =============================================================================
// Profile gate
// =============================================================================

pub struct ProfileGate;

impl ProfileGate {
    /// Spectral tilt outside this range suggests heavily processed audio.
    const TILT_RANGE: (f32, f32) = (-2.0, 2.0);

    pub fn validate(profile: &VoiceProfile) -> ValidationResult {
        if profile.frame_count() == 0 {
            return ValidationResult::empty_input("profile");
        }

        let mut issues = Vec::new();
        let mut suggestions = Vec::new();
        let mut score = 100.0f32;

        let pitch_result = PitchGate::validate(&profile.pitch);
        if !pitch_result.passed {
            issues.extend(pitch_result.issues);
            suggestions.extend(pitch_result.recovery_suggestions);
            score -= 100.0 - pitch_result.score;
        }

        let formant_result = FormantGate::validate(&profile.formants);
        if !formant_result.passed {
            issues.extend(formant_result.issues);
            suggestions.extend(formant_result.recovery_suggestions);
            score -= 100.0 - formant_result.score;
        }

        let tilt = profile.spectral.spectral_tilt;
        if tilt < Self::TILT_RANGE.0 || tilt > Self::TILT_RANGE.1 {
            issues.push(format!(
                "Spectral tilt out of range: {:.2} (expected {:.1} to {:.1})",
                tilt,
                Self::TILT_RANGE.0,
                Self::TILT_RANGE.1
            ));
            suggestions.push("May indicate unnatural or heavily processed audio".to_string());
            score -= 15.0;
        }

        let harmonic_frames = profile
            .harmonic_energy
            .iter()
            .filter(|&&e| e > 0.0)
            .count();
        let harmonic_ratio = harmonic_frames as f32 / profile.harmonic_energy.len().max(1) as f32;
        if harmonic_ratio < 0.5 {
            issues.push(format!(
                "Low harmonic content: {:.0}% of frames",
                harmonic_ratio * 100.0
            ));
            suggestions.push("Audio may be noisy, whispered, or contain artifacts".to_string());
            score -= 20.0;
        }

        ValidationResult::from_score(score, issues, suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpectralFeatures;

    fn good_profile() -> VoiceProfile {
        let t = 20;
        VoiceProfile {
            pitch: PitchContour {
                f0: vec![150.0; t],
                voiced_mask: vec![true; t],
                f0_mean: 150.0,
                f0_std: 2.0,
                hnr_db: 20.0,
            },
            formants: FormantTrack {
                frequencies: (0..5).map(|i| vec![500.0 * (i + 1) as f32; t]).collect(),
                bandwidths: (0..5).map(|_| vec![100.0; t]).collect(),
                mean_frequencies: (1..=5).map(|i| 500.0 * i as f32).collect(),
                mean_bandwidths: vec![100.0; 5],
            },
            spectral: SpectralFeatures {
                envelope: vec![vec![1.0; 16]; t],
                spectral_tilt: -0.5,
            },
            harmonic_ratios: vec![0.8; t],
            harmonic_energy: vec![1.0; t],
            sample_rate: 44100,
        }
    }

    #[test]
    fn test_good_profile_passes_all_gates() {
        let p = good_profile();
        assert!(PitchGate::validate(&p.pitch).passed);
        assert!(FormantGate::validate(&p.formants).passed);
        let result = ProfileGate::validate(&p);
        assert!(result.passed, "issues: {:?}", result.issues);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_unvoiced_pitch_penalized() {
        let mut p = good_profile();
        p.pitch.f0 = vec![f32::NAN; 20];
        p.pitch.voiced_mask = vec![false; 20];
        let result = PitchGate::validate(&p.pitch);
        assert!(!result.passed);
        assert_eq!(result.score, 30.0);
        assert_eq!(result.issues.len(), 2);
    }

    #[test]
    fn test_out_of_range_f0_penalized() {
        let mut p = good_profile();
        p.pitch.f0 = vec![900.0; 20];
        let result = PitchGate::validate(&p.pitch);
        assert!(!result.passed);
        assert_eq!(result.score, 80.0);
    }

    #[test]
    fn test_formant_ordering_violation() {
        let mut p = good_profile();
        p.formants.frequencies[1] = vec![400.0; 20];
        let result = FormantGate::validate(&p.formants);
        assert!(!result.passed);
        assert_eq!(result.score, 75.0);
    }

    #[test]
    fn test_formant_bandwidths_all_invalid() {
        let mut p = good_profile();
        p.formants.bandwidths = (0..5).map(|_| vec![0.0; 20]).collect();
        let result = FormantGate::validate(&p.formants);
        assert!(!result.passed);
        assert_eq!(result.score, 80.0);
    }

    #[test]
    fn test_empty_profile_fails_hard() {
        let mut p = good_profile();
        p.pitch.truncate(0);
        p.formants.truncate(0);
        p.spectral.truncate(0);
        p.harmonic_energy.clear();
        p.harmonic_ratios.clear();
        assert_eq!(PitchGate::validate(&p.pitch).score, 0.0);
        assert_eq!(FormantGate::validate(&p.formants).score, 0.0);
        assert_eq!(ProfileGate::validate(&p).score, 0.0);
    }

    #[test]
    fn test_tilt_out_of_range_penalized() {
        let mut p = good_profile();
        p.spectral.spectral_tilt = -3.5;
        let result = ProfileGate::validate(&p);
        assert!(!result.passed);
        assert_eq!(result.score, 85.0);
    }

    #[test]
    fn test_scores_bounded_below_by_zero() {
        let mut p = good_profile();
        p.pitch.f0 = vec![f32::NAN; 20];
        p.pitch.voiced_mask = vec![false; 20];
        p.formants.frequencies = (0..5).map(|_| vec![0.0; 20]).collect();
        p.formants.bandwidths = (0..5).map(|_| vec![0.0; 20]).collect();
        p.harmonic_energy = vec![0.0; 20];
        let result = ProfileGate::validate(&p);
        assert!(result.score >= 0.0);
        assert!(!result.passed);
    }
}
