//! Voice profile builder.
//!
//! Runs the pitch, formant and spectral analyzers over one recording and
//! assembles the result into a [`VoiceProfile`]. The three analyzers are an
//! immutable triple keyed by `(sample_rate, n_fft, hop)`; changing the
//! sample rate swaps the whole triple at once so a profile is never built
//! from analyzers that disagree about the rate.

use std::time::Instant;

use crate::config::QualitySettings;
use crate::constants::DEFAULT_N_FFT;
use crate::dsp::{FormantAnalyzer, PitchDetector, SpectralAnalyzer};
use crate::types::VoiceProfile;

/// Default cepstral truncation width for standalone construction.
const DEFAULT_CEPSTRAL_COEFFS: usize = 20;

/// Default formant median smoothing kernel.
const DEFAULT_MEDIAN_KERNEL: usize = 5;

/// Default base LPC order.
const DEFAULT_LPC_ORDER: usize = 14;

pub struct VoiceProfileBuilder {
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
    lpc_order: usize,
    median_kernel: usize,
    cepstral_coeffs: usize,
    pitch: PitchDetector,
    formant: FormantAnalyzer,
    spectral: SpectralAnalyzer,
}

impl VoiceProfileBuilder {
    pub fn new(sample_rate: u32, n_fft: usize, hop_length: usize) -> Self {
        Self::with_tuning(
            sample_rate,
            n_fft,
            hop_length,
            DEFAULT_LPC_ORDER,
            DEFAULT_MEDIAN_KERNEL,
            DEFAULT_CEPSTRAL_COEFFS,
        )
    }

    /// Construct from a quality preset: hop, LPC order, smoothing kernel and
    /// cepstral width all derive from the settings.
    pub fn from_settings(sample_rate: u32, settings: &QualitySettings) -> Self {
        Self::with_tuning(
            sample_rate,
            DEFAULT_N_FFT,
            settings.hop_length(DEFAULT_N_FFT),
            settings.formant_tracking_order,
            settings.formant_median_kernel(),
            settings.cepstral_coeffs(),
        )
    }

    fn with_tuning(
        sample_rate: u32,
        n_fft: usize,
        hop_length: usize,
        lpc_order: usize,
        median_kernel: usize,
        cepstral_coeffs: usize,
    ) -> Self {
        Self {
            sample_rate,
            n_fft,
            hop_length,
            lpc_order,
            median_kernel,
            cepstral_coeffs,
            pitch: PitchDetector::new(sample_rate, hop_length),
            formant: FormantAnalyzer::new(sample_rate, lpc_order, median_kernel),
            spectral: SpectralAnalyzer::new(sample_rate, n_fft, hop_length, cepstral_coeffs),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Swap the analyzer triple for a new sample rate. No-op when unchanged.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate {
            return;
        }
        *self = Self::with_tuning(
            sample_rate,
            self.n_fft,
            self.hop_length,
            self.lpc_order,
            self.median_kernel,
            self.cepstral_coeffs,
        );
    }

    /// Analyze `y` and assemble an aligned profile.
    pub fn build(&self, y: &[f32], name: &str) -> VoiceProfile {
        log::info!("building voice profile for: {name}");

        let started = Instant::now();
        let mut pitch = self.pitch.detect(y);
        log::debug!("pitch detection took {:.3}s", started.elapsed().as_secs_f64());

        let started = Instant::now();
        let mut formants = self.formant.analyze(y, &pitch.f0);
        log::debug!("formant analysis took {:.3}s", started.elapsed().as_secs_f64());

        let started = Instant::now();
        let mut spectral = self.spectral.analyze(y);
        let (mut harmonic_energy, mut harmonic_ratios) = self.spectral.harmonic_stats(y, &pitch.f0);
        log::debug!("spectral analysis took {:.3}s", started.elapsed().as_secs_f64());

        // Align every per-frame series to the shortest one.
        let min_len = pitch
            .f0
            .len()
            .min(formants.frame_count())
            .min(spectral.frame_count())
            .min(harmonic_energy.len());
        pitch.truncate(min_len);
        formants.truncate(min_len);
        spectral.truncate(min_len);
        harmonic_energy.truncate(min_len);
        harmonic_ratios.truncate(min_len);

        log::info!("profile built, mean F0 {:.1} Hz", pitch.f0_mean);

        VoiceProfile {
            pitch,
            formants,
            spectral,
            harmonic_ratios,
            harmonic_energy,
            sample_rate: self.sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sr: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn test_frame_arrays_share_length() {
        let builder = VoiceProfileBuilder::new(44100, 2048, 512);
        let profile = builder.build(&sine(220.0, 44100, 22050), "test");
        let t = profile.frame_count();
        assert!(t > 0);
        assert_eq!(profile.pitch.voiced_mask.len(), t);
        assert_eq!(profile.formants.frame_count(), t);
        assert_eq!(profile.spectral.frame_count(), t);
        assert_eq!(profile.harmonic_energy.len(), t);
        assert_eq!(profile.harmonic_ratios.len(), t);
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = VoiceProfileBuilder::new(44100, 2048, 512);
        let y = sine(180.0, 44100, 22050);
        let a = builder.build(&y, "a");
        let b = builder.build(&y, "b");
        // JSON comparison sidesteps NaN != NaN on unvoiced frames.
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_very_short_input_gives_empty_frames() {
        let builder = VoiceProfileBuilder::new(44100, 2048, 512);
        let profile = builder.build(&[0.1, -0.2, 0.3], "short");
        assert_eq!(profile.frame_count(), 0);
        assert_eq!(profile.pitch.f0_mean, 150.0);
        assert_eq!(profile.formants.mean_frequencies.len(), 5);
    }

    #[test]
    fn test_sample_rate_swap_rebuilds_triple() {
        let mut builder = VoiceProfileBuilder::new(44100, 2048, 512);
        builder.set_sample_rate(22050);
        assert_eq!(builder.sample_rate(), 22050);
        let profile = builder.build(&sine(220.0, 22050, 11025), "swap");
        assert_eq!(profile.sample_rate, 22050);
    }
}
