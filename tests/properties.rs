//! Property-based invariants over the DSP primitives.

use proptest::prelude::*;

use voico::dsp::{SpectralShifter, StftEngine};
use voico::matcher::VoiceMatcher;
use voico::quality::QualityScorer;
use voico::types::{FormantTrack, PitchContour, SpectralFeatures, VoiceProfile};

fn profile_from(f0: Vec<f32>, f0_mean: f32, formants: Vec<f32>, tilt: f32) -> VoiceProfile {
    let t = f0.len();
    let voiced_mask: Vec<bool> = f0.iter().map(|v| v.is_finite()).collect();
    VoiceProfile {
        pitch: PitchContour {
            f0,
            voiced_mask,
            f0_mean,
            f0_std: 0.0,
            hnr_db: 15.0,
        },
        formants: FormantTrack {
            frequencies: formants.iter().map(|&f| vec![f; t]).collect(),
            bandwidths: formants.iter().map(|_| vec![100.0; t]).collect(),
            mean_frequencies: formants.clone(),
            mean_bandwidths: vec![100.0; formants.len()],
        },
        spectral: SpectralFeatures {
            envelope: vec![vec![1.0; 8]; t],
            spectral_tilt: tilt,
        },
        harmonic_ratios: vec![0.5; t],
        harmonic_energy: vec![1.0; t],
        sample_rate: 44100,
    }
}

proptest! {
    #[test]
    fn prop_formant_warp_identity(
        rows in prop::collection::vec(
            prop::collection::vec(0.0f32..10.0, 64),
            1..6,
        )
    ) {
        let shifter = SpectralShifter::new(44100, 126);
        prop_assert_eq!(shifter.shift_formants(&rows, 1.0), rows);
    }

    #[test]
    fn prop_zero_pitch_shift_identity(
        samples in prop::collection::vec(-1.0f32..1.0, 1..512)
    ) {
        let shifter = SpectralShifter::new(44100, 2048);
        prop_assert_eq!(shifter.shift_pitch(&samples, 0.0), samples);
    }

    #[test]
    fn prop_matcher_self_match_is_neutral(
        f0_mean in 60.0f32..500.0,
        f1 in 300.0f32..900.0,
        f2 in 1000.0f32..2000.0,
        f3 in 2100.0f32..3200.0,
    ) {
        let p = profile_from(vec![f0_mean; 8], f0_mean, vec![f1, f2, f3], 0.0);
        let (st, factor) = VoiceMatcher::match_profiles(&p, &p);
        prop_assert!(st.abs() < 1e-2);
        prop_assert!((factor - 1.0).abs() < 1e-2);
    }

    #[test]
    fn prop_matcher_factor_always_clamped(
        src_f1 in 50.0f32..8000.0,
        src_f2 in 50.0f32..8000.0,
        tgt_f1 in 50.0f32..8000.0,
        tgt_f2 in 50.0f32..8000.0,
        src_f0 in 50.0f32..600.0,
        tgt_f0 in 50.0f32..600.0,
    ) {
        let src = profile_from(vec![src_f0; 8], src_f0, vec![src_f1, src_f2], 0.0);
        let tgt = profile_from(vec![tgt_f0; 8], tgt_f0, vec![tgt_f1, tgt_f2], 0.0);
        let (_, factor) = VoiceMatcher::match_profiles(&src, &tgt);
        prop_assert!((0.5..=2.0).contains(&factor));
    }

    #[test]
    fn prop_quality_score_bounded_and_averaged(
        f0_mean in 40.0f32..700.0,
        frames in 0usize..40,
        tilt in -4.0f32..4.0,
        f1 in 100.0f32..1000.0,
    ) {
        let p = profile_from(
            vec![f0_mean; frames],
            f0_mean,
            vec![f1, f1 * 2.5, f1 * 4.0],
            tilt,
        );
        let score = QualityScorer::score_profile(&p);
        prop_assert!(score.overall_score >= 0.0 && score.overall_score <= 100.0);
        let mean = (score.pitch_score + score.formant_score + score.profile_score) / 3.0;
        prop_assert!((score.overall_score - mean).abs() < 1e-4);
    }

    #[test]
    fn prop_stft_round_trip(
        freq in 80.0f32..4000.0,
        amp in 0.1f32..0.9,
    ) {
        let sr = 22050.0;
        let n_fft = 512;
        let x: Vec<f32> = (0..4096)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sr).sin())
            .collect();
        let stft = StftEngine::new(n_fft, n_fft / 4);
        let y = stft.inverse(&stft.forward(&x), Some(x.len()));

        let mut err = 0.0f64;
        let mut count = 0usize;
        for i in n_fft..(x.len() - n_fft) {
            let d = (x[i] - y[i]) as f64;
            err += d * d;
            count += 1;
        }
        let rms = (err / count as f64).sqrt();
        prop_assert!(rms < 1e-5, "round trip rms {}", rms);
    }
}
