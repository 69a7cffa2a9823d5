//! End-to-end pipeline scenarios through temporary WAV files.

use std::f32::consts::PI;
use std::path::Path;

use voico::audio_io::{load_audio, save_audio};
use voico::config::ConversionQuality;
use voico::converter::{auto_output_path, ConversionRequest, VoiceConverter};
use voico::error::{AnalysisError, VoicoError};

fn write_sine(path: &Path, freq: f32, sr: u32, seconds: f32) {
    let n = (seconds * sr as f32) as usize;
    let samples: Vec<f32> = (0..n)
        .map(|i| 0.8 * (2.0 * PI * freq * i as f32 / sr as f32).sin())
        .collect();
    save_audio(path, &samples, sr, 16).unwrap();
}

#[test]
fn test_pitch_shift_produces_resampled_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tone.wav");
    let output = dir.path().join("tone_up.wav");
    write_sine(&input, 440.0, 44100, 0.5);

    let mut request = ConversionRequest::new(&input, &output);
    request.pitch_shift = 2.0;
    let mut converter = VoiceConverter::with_seed(ConversionQuality::Turbo, 7);
    let report = converter.process(&request).unwrap();

    assert!(output.exists());
    assert_eq!(report.sample_rate, 44100);
    assert!((report.pitch_shift_applied - 2.0).abs() < 1e-6);

    // Time-domain resampling shortens the file by the pitch factor.
    let factor = 2.0f64.powf(2.0 / 12.0);
    let expected = report.input_duration_seconds / factor;
    let rel = (report.output_duration_seconds - expected).abs() / expected;
    assert!(rel < 0.02, "duration {} vs expected {expected}", report.output_duration_seconds);

    assert!(report.snr_db.is_finite());
    assert!(report.snr_db <= 60.0);
    assert!(!report.stage_timings.is_empty());
    assert!(report.stage_timings.contains_key("shift"));
}

#[test]
fn test_matching_octave_pair_yields_twelve_semitones() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("low.wav");
    let target = dir.path().join("high.wav");
    let output = dir.path().join("low_to_high.wav");
    write_sine(&source, 100.0, 44100, 1.0);
    write_sine(&target, 200.0, 44100, 1.0);

    let mut request = ConversionRequest::new(&source, &output);
    request.target_path = Some(target);
    // Manual values get overridden by the match.
    request.pitch_shift = -5.0;

    let mut converter = VoiceConverter::with_seed(ConversionQuality::Turbo, 7);
    let report = converter.process(&request).unwrap();

    assert!(
        (report.pitch_shift_applied - 12.0).abs() < 0.3,
        "matched {} semitones",
        report.pitch_shift_applied
    );
    assert!(report.formant_shift_applied >= 0.5 && report.formant_shift_applied <= 2.0);
    assert!(output.exists());
}

#[test]
fn test_neutral_conversion_is_high_snr() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");
    write_sine(&input, 220.0, 44100, 0.5);

    let request = ConversionRequest::new(&input, &output);
    let mut converter = VoiceConverter::with_seed(ConversionQuality::Fast, 7);
    let report = converter.process(&request).unwrap();

    assert!(report.snr_db > 40.0, "snr {}", report.snr_db);
    assert!(
        (report.output_duration_seconds - report.input_duration_seconds).abs() < 1e-6
    );

    let (samples, sr) = load_audio(&output).unwrap();
    assert_eq!(sr, 44100);
    assert!(!samples.is_empty());
}

#[test]
fn test_silence_fails_quality_gate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("silence.wav");
    let output = dir.path().join("never.wav");
    save_audio(&input, &vec![0.0f32; 22050], 44100, 16).unwrap();

    let request = ConversionRequest::new(&input, &output);
    let mut converter = VoiceConverter::new(ConversionQuality::Turbo);
    let err = converter.process(&request).unwrap_err();

    match err {
        VoicoError::Analysis(AnalysisError::ProfileQualityInsufficient { score, issues, .. }) => {
            assert!(score < 30.0);
            assert!(!issues.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn test_missing_input_is_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let request = ConversionRequest::new(dir.path().join("ghost.wav"), dir.path().join("o.wav"));
    let mut converter = VoiceConverter::new(ConversionQuality::Turbo);
    let err = converter.process(&request).unwrap_err();
    assert!(matches!(err, VoicoError::AudioLoad { .. }));
    assert!(!err.suggestions().is_empty());
}

#[test]
fn test_32_bit_output_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out32.wav");
    write_sine(&input, 330.0, 22050, 0.5);

    let mut request = ConversionRequest::new(&input, &output);
    request.bit_depth = 32;
    let mut converter = VoiceConverter::with_seed(ConversionQuality::Turbo, 3);
    converter.process(&request).unwrap();

    let (samples, sr) = load_audio(&output).unwrap();
    assert_eq!(sr, 22050);
    let peak = samples.iter().fold(0.0f32, |a, &v| a.max(v.abs()));
    assert!((peak - 0.95).abs() < 0.01, "peak {peak}");
}

#[test]
fn test_cli_auto_paths_match_expected_names() {
    assert_eq!(
        auto_output_path(Path::new("in.wav"), None, 2.0, 1.0),
        Path::new("in_shifted_p2.0_f1.0.wav")
    );
    assert_eq!(
        auto_output_path(Path::new("src.wav"), Some(Path::new("tgt.wav")), 2.0, 1.0),
        Path::new("src_to_tgt.wav")
    );
}

#[test]
fn test_formant_warp_with_original_phase() {
    // FAST: formant correction on, advanced phase off -> original-phase path.
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("warped.wav");
    write_sine(&input, 220.0, 44100, 0.5);

    let mut request = ConversionRequest::new(&input, &output);
    request.formant_shift = 1.3;
    let mut converter = VoiceConverter::with_seed(ConversionQuality::Fast, 11);
    let report = converter.process(&request).unwrap();

    assert!(output.exists());
    assert!((report.formant_shift_applied - 1.3).abs() < 1e-6);
    let (samples, _) = load_audio(&output).unwrap();
    assert!(samples.iter().any(|&v| v.abs() > 0.01));
}
