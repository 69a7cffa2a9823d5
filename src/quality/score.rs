//! Conversion viability scoring.
//!
//! Averages the three validation gates into one 0-100 score. Failing gates
//! contribute critical issues; passing gates below 70 contribute warnings.

use crate::quality::gates::{FormantGate, PitchGate, ProfileGate};
use crate::types::VoiceProfile;

/// Profiles scoring below this cannot be converted usefully.
const MIN_VIABLE_SCORE: f32 = 30.0;

/// Passing gates under this score still warrant a warning.
const WARNING_SCORE: f32 = 70.0;

/// Aggregate quality assessment of one profile.
#[derive(Debug, Clone)]
pub struct ConversionQualityScore {
    pub overall_score: f32,
    pub pitch_score: f32,
    pub formant_score: f32,
    pub profile_score: f32,
    pub is_viable: bool,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl std::fmt::Display for ConversionQualityScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let viability = if self.is_viable { "VIABLE" } else { "NOT VIABLE" };
        writeln!(f, "[{viability}] Overall Score: {:.1}/100", self.overall_score)?;
        writeln!(f, "  Pitch:   {:.1}/100", self.pitch_score)?;
        writeln!(f, "  Formant: {:.1}/100", self.formant_score)?;
        writeln!(f, "  Profile: {:.1}/100", self.profile_score)?;
        writeln!(f, "Critical Issues: {}", self.critical_issues.len())?;
        write!(f, "Warnings: {}", self.warnings.len())
    }
}

pub struct QualityScorer;

impl QualityScorer {
    pub fn score_profile(profile: &VoiceProfile) -> ConversionQualityScore {
        let pitch_result = PitchGate::validate(&profile.pitch);
        let formant_result = FormantGate::validate(&profile.formants);
        let profile_result = ProfileGate::validate(profile);

        let overall = (pitch_result.score + formant_result.score + profile_result.score) / 3.0;

        let mut critical_issues = Vec::new();
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        for result in [&pitch_result, &formant_result, &profile_result] {
            if !result.passed {
                critical_issues.extend(result.issues.iter().cloned());
            } else if result.score < WARNING_SCORE {
                warnings.extend(result.issues.iter().cloned());
            }
            for suggestion in &result.recovery_suggestions {
                if !recommendations.contains(suggestion) {
                    recommendations.push(suggestion.clone());
                }
            }
        }

        ConversionQualityScore {
            overall_score: overall,
            pitch_score: pitch_result.score,
            formant_score: formant_result.score,
            profile_score: profile_result.score,
            is_viable: overall >= MIN_VIABLE_SCORE,
            critical_issues,
            warnings,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormantTrack, PitchContour, SpectralFeatures};

    fn profile(voiced: bool, t: usize) -> VoiceProfile {
        VoiceProfile {
            pitch: PitchContour {
                f0: if voiced {
                    vec![150.0; t]
                } else {
                    vec![f32::NAN; t]
                },
                voiced_mask: vec![voiced; t],
                f0_mean: 150.0,
                f0_std: 0.0,
                hnr_db: if voiced { 20.0 } else { 0.0 },
            },
            formants: FormantTrack {
                frequencies: (0..5)
                    .map(|i| vec![if voiced { 500.0 * (i + 1) as f32 } else { 0.0 }; t])
                    .collect(),
                bandwidths: (0..5).map(|_| vec![if voiced { 100.0 } else { 0.0 }; t]).collect(),
                mean_frequencies: (1..=5).map(|i| 500.0 * i as f32).collect(),
                mean_bandwidths: vec![100.0; 5],
            },
            spectral: SpectralFeatures {
                envelope: vec![vec![1.0; 16]; t],
                spectral_tilt: 0.0,
            },
            harmonic_ratios: vec![if voiced { 0.8 } else { 0.0 }; t],
            harmonic_energy: vec![if voiced { 1.0 } else { 0.0 }; t],
            sample_rate: 44100,
        }
    }

    #[test]
    fn test_clean_profile_is_viable() {
        let score = QualityScorer::score_profile(&profile(true, 30));
        assert!(score.is_viable);
        assert_eq!(score.overall_score, 100.0);
        assert!(score.critical_issues.is_empty());
    }

    #[test]
    fn test_silent_profile_is_not_viable() {
        let score = QualityScorer::score_profile(&profile(false, 30));
        assert!(!score.is_viable, "overall {}", score.overall_score);
        assert!(!score.critical_issues.is_empty());
    }

    #[test]
    fn test_empty_profile_is_not_viable() {
        let score = QualityScorer::score_profile(&profile(true, 0));
        assert!(!score.is_viable);
        assert_eq!(score.overall_score, 0.0);
    }

    #[test]
    fn test_overall_is_mean_of_gates() {
        for p in [profile(true, 30), profile(false, 30), profile(true, 0)] {
            let score = QualityScorer::score_profile(&p);
            let mean = (score.pitch_score + score.formant_score + score.profile_score) / 3.0;
            assert!((score.overall_score - mean).abs() < 1e-5);
            assert!(score.overall_score >= 0.0 && score.overall_score <= 100.0);
        }
    }

    #[test]
    fn test_display_mentions_viability() {
        let text = QualityScorer::score_profile(&profile(true, 30)).to_string();
        assert!(text.contains("VIABLE"));
    }
}
