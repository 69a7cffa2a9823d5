//! Batch conversion pipeline.
//!
//! Stages run in sequence: Load -> Analyze -> Match -> Shift -> Metrics ->
//! Output. Each stage is timed and recorded in the diagnostics, which are
//! finalized on every exit path. Quality-gate rejections and I/O failures
//! abort the run; everything else recovers locally inside the DSP stages.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio_io::{load_audio, normalize_audio, save_audio, TARGET_PEAK};
use crate::config::{ConversionQuality, QualitySettings};
use crate::constants::{DEFAULT_N_FFT, EPSILON};
use crate::error::{AnalysisError, ConversionError, VoicoError};
use crate::matcher::VoiceMatcher;
use crate::profile::VoiceProfileBuilder;
use crate::quality::{DiagnosticLogger, PipelineDiagnostics, QualityScorer};
use crate::types::ConversionReport;
use crate::dsp::{PhaseProcessor, SpectralShifter, StftEngine};

/// SNR values are capped here; a near-zero residual reads as "perfect".
const SNR_CEILING_DB: f32 = 60.0;

/// Griffin-Lim is only worth its cost above this iteration count; below it
/// the single-pass RTPGHI estimate is at least as good.
const GRIFFIN_LIM_MIN_ITERS: usize = 32;

/// One batch conversion job.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub pitch_shift: f32,
    pub formant_shift: f32,
    pub target_path: Option<PathBuf>,
    pub bit_depth: u16,
}

impl ConversionRequest {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            pitch_shift: 0.0,
            formant_shift: 1.0,
            target_path: None,
            bit_depth: 16,
        }
    }

    fn validate(&self) -> Result<(), VoicoError> {
        if !self.pitch_shift.is_finite() || self.pitch_shift.abs() > 48.0 {
            return Err(ConversionError::Validation {
                message: format!("pitch shift out of range: {}", self.pitch_shift),
                suggestions: vec!["Use a shift between -48 and +48 semitones".to_string()],
            }
            .into());
        }
        if !self.formant_shift.is_finite() || !(0.25..=4.0).contains(&self.formant_shift) {
            return Err(ConversionError::Validation {
                message: format!("formant factor out of range: {}", self.formant_shift),
                suggestions: vec!["Use a factor between 0.25 and 4.0".to_string()],
            }
            .into());
        }
        if self.bit_depth != 16 && self.bit_depth != 32 {
            return Err(ConversionError::Validation {
                message: format!("unsupported bit depth: {}", self.bit_depth),
                suggestions: vec!["Use 16 or 32".to_string()],
            }
            .into());
        }
        Ok(())
    }
}

/// Output path used when the caller does not supply one: named after the
/// target for matched conversions, after the shift parameters otherwise.
pub fn auto_output_path(input: &Path, target: Option<&Path>, pitch: f32, formant: f32) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = input.extension().and_then(|e| e.to_str()).unwrap_or("wav");
    let name = match target {
        Some(t) => {
            let target_stem = t.file_stem().and_then(|s| s.to_str()).unwrap_or("target");
            format!("{stem}_to_{target_stem}.{ext}")
        }
        None => format!("{stem}_shifted_p{pitch:.1}_f{formant:.1}.{ext}"),
    };
    input.with_file_name(name)
}

pub struct VoiceConverter {
    quality: ConversionQuality,
    settings: QualitySettings,
    n_fft: usize,
    hop_length: usize,
    builder: VoiceProfileBuilder,
    phase: PhaseProcessor,
}

impl VoiceConverter {
    pub fn new(quality: ConversionQuality) -> Self {
        let settings = QualitySettings::from_preset(quality);
        let n_fft = DEFAULT_N_FFT;
        let hop_length = settings.hop_length(n_fft);
        Self {
            quality,
            settings,
            n_fft,
            hop_length,
            builder: VoiceProfileBuilder::from_settings(44100, &settings),
            phase: PhaseProcessor::new(n_fft, hop_length),
        }
    }

    /// Deterministic variant: phase reconstruction draws from `seed`.
    pub fn with_seed(quality: ConversionQuality, seed: u64) -> Self {
        let mut converter = Self::new(quality);
        converter.phase.reseed(seed);
        converter
    }

    pub fn settings(&self) -> &QualitySettings {
        &self.settings
    }

    /// Run one conversion. Diagnostics are finalized on success and on
    /// every failure path alike.
    pub fn process(&mut self, request: &ConversionRequest) -> Result<ConversionReport, VoicoError> {
        let pipeline_id = format!(
            "conv-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f")
        );
        let mut diag = DiagnosticLogger::new(&pipeline_id);
        diag.log_input(
            &request.input_path.display().to_string(),
            &request.output_path.display().to_string(),
            self.quality.name(),
        );

        let result = self.run_pipeline(request, &mut diag);
        let diagnostics = diag.finalize();
        log::debug!(
            "pipeline {} finished in {:.2}s ({} errors, {} warnings)",
            diagnostics.pipeline_id,
            diagnostics.total_duration_seconds,
            diagnostics.errors.len(),
            diagnostics.warnings.len()
        );
        result.map(|mut report| {
            report.stage_timings = diagnostics
                .stage_timings
                .iter()
                .cloned()
                .collect::<BTreeMap<_, _>>();
            report
        })
    }

    /// Like [`process`](Self::process) but also returns the diagnostics
    /// record, including partial records for failed runs.
    pub fn process_with_diagnostics(
        &mut self,
        request: &ConversionRequest,
    ) -> (Result<ConversionReport, VoicoError>, PipelineDiagnostics) {
        let mut diag = DiagnosticLogger::new("conv-diagnostic");
        let result = self.run_pipeline(request, &mut diag);
        (result, diag.finalize())
    }

    fn run_pipeline(
        &mut self,
        request: &ConversionRequest,
        diag: &mut DiagnosticLogger,
    ) -> Result<ConversionReport, VoicoError> {
        request.validate().map_err(|e| {
            diag.log_error("validate", &e.to_string());
            e
        })?;

        // ---- Load -------------------------------------------------------
        let started = Instant::now();
        let (samples, sample_rate) = load_audio(&request.input_path).map_err(|e| {
            diag.log_error("load", &e.to_string());
            e
        })?;
        let samples = normalize_audio(&samples, TARGET_PEAK);
        diag.log_stage_timing("load", started.elapsed().as_secs_f64());
        log::info!(
            "loaded {} ({} samples @ {sample_rate} Hz)",
            request.input_path.display(),
            samples.len()
        );

        // ---- Analyze source ---------------------------------------------
        let started = Instant::now();
        self.builder.set_sample_rate(sample_rate);
        let source_profile = self.builder.build(&samples, "source");
        let source_score = QualityScorer::score_profile(&source_profile);
        diag.log_quality_score("source_overall", source_score.overall_score);
        diag.log_validation(
            "source_profile",
            source_score.is_viable,
            &source_score.critical_issues,
        );
        diag.log_stage_timing("analyze", started.elapsed().as_secs_f64());
        if !source_score.is_viable {
            let err: VoicoError = AnalysisError::ProfileQualityInsufficient {
                score: source_score.overall_score,
                issues: source_score.critical_issues.clone(),
                suggestions: source_score.recommendations.clone(),
            }
            .into();
            diag.log_error("analyze", &err.to_string());
            return Err(err);
        }

        // ---- Match ------------------------------------------------------
        let mut pitch_shift = request.pitch_shift;
        let mut formant_shift = request.formant_shift;
        if let Some(target_path) = &request.target_path {
            let started = Instant::now();
            let (target_samples, target_sr) = load_audio(target_path).map_err(|e| {
                diag.log_error("match", &e.to_string());
                e
            })?;
            self.builder.set_sample_rate(target_sr);
            let target_profile = self.builder.build(&target_samples, "target");
            self.builder.set_sample_rate(sample_rate);

            let target_score = QualityScorer::score_profile(&target_profile);
            diag.log_quality_score("target_overall", target_score.overall_score);
            diag.log_validation(
                "target_profile",
                target_score.is_viable,
                &target_score.critical_issues,
            );
            if !target_score.is_viable {
                let err: VoicoError = AnalysisError::ProfileQualityInsufficient {
                    score: target_score.overall_score,
                    issues: target_score.critical_issues.clone(),
                    suggestions: target_score.recommendations.clone(),
                }
                .into();
                diag.log_error("match", &err.to_string());
                return Err(err);
            }

            let (matched_pitch, matched_formant) =
                VoiceMatcher::match_profiles(&source_profile, &target_profile);
            if !matched_pitch.is_finite() || matched_pitch.abs() > 48.0 {
                let err: VoicoError = ConversionError::Matching {
                    message: format!(
                        "matched pitch shift {matched_pitch:.1} st is outside the usable range"
                    ),
                    suggestions: vec![
                        "Pitch analysis of the source or target is unreliable".to_string(),
                        "Try manual shift values instead of auto-matching".to_string(),
                    ],
                }
                .into();
                diag.log_error("match", &err.to_string());
                return Err(err);
            }
            if request.pitch_shift != 0.0 || request.formant_shift != 1.0 {
                diag.log_warning(
                    "match",
                    "manual shift values overridden by target matching",
                );
            }
            pitch_shift = matched_pitch;
            formant_shift = matched_formant;
            diag.log_stage_timing("match", started.elapsed().as_secs_f64());
        }

        // ---- Shift ------------------------------------------------------
        let started = Instant::now();
        log::info!("applying pitch {pitch_shift:.2} st, formant {formant_shift:.2}x");
        let shifter = SpectralShifter::new(sample_rate, self.n_fft);
        let shifted = shifter.shift_pitch(&samples, pitch_shift);

        let converted = if (formant_shift - 1.0).abs() > 0.01 {
            if !self.settings.use_formant_correction {
                diag.log_warning(
                    "shift",
                    "formant warp requested but disabled by the quality preset",
                );
                shifted
            } else {
                let stft = StftEngine::new(self.n_fft, self.hop_length);
                let frames = stft.forward(&shifted);
                let magnitude = StftEngine::magnitude(&frames);
                let warped = shifter.shift_formants(&magnitude, formant_shift);

                if self.settings.use_advanced_phase {
                    let iters = self.settings.griffin_lim_iters;
                    let reconstructed = if iters > GRIFFIN_LIM_MIN_ITERS {
                        self.phase.griffin_lim(&warped, iters, None)
                    } else {
                        self.phase.reconstruct_rtpghi(&warped)
                    };
                    let mut reconstructed = reconstructed;
                    reconstructed.truncate(shifted.len());
                    reconstructed
                } else {
                    let phase = StftEngine::phase(&frames);
                    stft.inverse_from_polar(&warped, &phase, Some(shifted.len()))
                }
            }
        } else {
            shifted
        };
        diag.log_stage_timing("shift", started.elapsed().as_secs_f64());

        // ---- Metrics ----------------------------------------------------
        let started = Instant::now();
        let snr_db = signal_to_noise_db(&samples, &converted);
        let centroid_deviation = centroid_deviation(&samples, &converted, sample_rate, self.n_fft);
        diag.log_quality_score("snr_db", snr_db);
        diag.log_quality_score("centroid_deviation", centroid_deviation);
        diag.log_stage_timing("metrics", started.elapsed().as_secs_f64());

        // ---- Output -----------------------------------------------------
        let started = Instant::now();
        let output = normalize_audio(&converted, TARGET_PEAK);
        save_audio(
            &request.output_path,
            &output,
            sample_rate,
            request.bit_depth,
        )
        .map_err(|e| {
            diag.log_error("output", &e.to_string());
            e
        })?;
        diag.log_stage_timing("output", started.elapsed().as_secs_f64());
        log::info!("saved {}", request.output_path.display());

        Ok(ConversionReport {
            output_path: request.output_path.display().to_string(),
            pitch_shift_applied: pitch_shift,
            formant_shift_applied: formant_shift,
            sample_rate,
            input_duration_seconds: samples.len() as f64 / sample_rate as f64,
            output_duration_seconds: output.len() as f64 / sample_rate as f64,
            snr_db,
            spectral_centroid_deviation: centroid_deviation,
            stage_timings: BTreeMap::new(),
        })
    }
}

/// `10 log10(sum(x^2) / sum((x - y)^2))` over the overlapping prefix,
/// capped at the ceiling.
fn signal_to_noise_db(x: &[f32], y: &[f32]) -> f32 {
    let n = x.len().min(y.len());
    if n == 0 {
        return 0.0;
    }
    let mut signal = 0.0f64;
    let mut noise = 0.0f64;
    for i in 0..n {
        signal += (x[i] as f64) * (x[i] as f64);
        let d = (x[i] - y[i]) as f64;
        noise += d * d;
    }
    if signal < EPSILON as f64 {
        return 0.0;
    }
    if noise < EPSILON as f64 {
        return SNR_CEILING_DB;
    }
    ((10.0 * (signal / noise).log10()) as f32).min(SNR_CEILING_DB)
}

/// Spectral centroid over the first `n_fft` samples.
fn spectral_centroid(samples: &[f32], sample_rate: u32, n_fft: usize) -> f32 {
    let mut buf: Vec<Complex<f32>> = (0..n_fft)
        .map(|i| Complex::new(samples.get(i).copied().unwrap_or(0.0), 0.0))
        .collect();
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    fft.process(&mut buf);

    let bins = n_fft / 2 + 1;
    let bin_hz = sample_rate as f32 / n_fft as f32;
    let mut weighted = 0.0f32;
    let mut total = 0.0f32;
    for (k, c) in buf.iter().take(bins).enumerate() {
        let m = c.norm();
        weighted += k as f32 * bin_hz * m;
        total += m;
    }
    if total > EPSILON {
        weighted / total
    } else {
        0.0
    }
}

/// Relative deviation of the output centroid from the input centroid.
fn centroid_deviation(x: &[f32], y: &[f32], sample_rate: u32, n_fft: usize) -> f32 {
    let cx = spectral_centroid(x, sample_rate, n_fft);
    if cx <= EPSILON {
        return 0.0;
    }
    let cy = spectral_centroid(y, sample_rate, n_fft);
    (cy - cx).abs() / cx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_output_path_shift_form() {
        let path = auto_output_path(Path::new("in.wav"), None, 2.0, 1.0);
        assert_eq!(path, PathBuf::from("in_shifted_p2.0_f1.0.wav"));
    }

    #[test]
    fn test_auto_output_path_target_form() {
        let path = auto_output_path(Path::new("src.wav"), Some(Path::new("tgt.wav")), 0.0, 1.0);
        assert_eq!(path, PathBuf::from("src_to_tgt.wav"));
    }

    #[test]
    fn test_auto_output_path_keeps_directory() {
        let path = auto_output_path(Path::new("/tmp/voice/in.wav"), None, -1.5, 0.8);
        assert_eq!(
            path,
            PathBuf::from("/tmp/voice/in_shifted_p-1.5_f0.8.wav")
        );
    }

    #[test]
    fn test_request_validation() {
        let mut req = ConversionRequest::new("a.wav", "b.wav");
        assert!(req.validate().is_ok());
        req.bit_depth = 24;
        assert!(req.validate().is_err());
        req.bit_depth = 16;
        req.pitch_shift = 90.0;
        assert!(req.validate().is_err());
        req.pitch_shift = 0.0;
        req.formant_shift = 0.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_diagnostics_record_failures() {
        let mut converter = VoiceConverter::new(ConversionQuality::Turbo);
        let request = ConversionRequest::new("/nonexistent/ghost.wav", "/tmp/never.wav");
        let (result, diagnostics) = converter.process_with_diagnostics(&request);
        assert!(result.is_err());
        assert!(!diagnostics.errors.is_empty());
        assert!(diagnostics.end_time.is_some());
    }

    #[test]
    fn test_snr_identity_hits_ceiling() {
        let x = vec![0.5f32; 1000];
        assert_eq!(signal_to_noise_db(&x, &x), SNR_CEILING_DB);
    }

    #[test]
    fn test_snr_zero_for_empty() {
        assert_eq!(signal_to_noise_db(&[], &[]), 0.0);
    }

    #[test]
    fn test_centroid_tracks_frequency() {
        let sr = 44100;
        let low: Vec<f32> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * 300.0 * i as f32 / sr as f32).sin())
            .collect();
        let high: Vec<f32> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * 3000.0 * i as f32 / sr as f32).sin())
            .collect();
        let c_low = spectral_centroid(&low, sr, 2048);
        let c_high = spectral_centroid(&high, sr, 2048);
        assert!(c_high > c_low);
        assert!(c_low > 100.0 && c_low < 1500.0, "centroid {c_low}");
    }

    #[test]
    fn test_centroid_deviation_zero_for_identical() {
        let x: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.05).sin()).collect();
        assert_eq!(centroid_deviation(&x, &x, 44100, 2048), 0.0);
    }
}
