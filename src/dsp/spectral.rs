//! Spectral feature analyzer: cepstral envelope, spectral tilt and
//! harmonic-band energy.
//!
//! The envelope is obtained by low-pass liftering the log magnitude along
//! the frequency axis: quefrency bins at or above the truncation width are
//! zeroed before the inverse transform, and the exponential of the result
//! is strictly positive by construction.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::constants::{EPSILON, MIN_F0_HZ};
use crate::dsp::math::{polyfit_linear, safe_div, safe_ln};
use crate::dsp::stft::StftEngine;
use crate::types::SpectralFeatures;

/// Tilt is fitted over this band (Hz).
const TILT_BAND_LOW_HZ: f32 = 100.0;
const TILT_BAND_HIGH_HZ: f32 = 8000.0;

/// Minimum bins in the fitting band for a meaningful tilt estimate.
const TILT_MIN_BINS: usize = 10;

/// Harmonics considered by the band-energy mask.
const HARMONIC_COUNT: usize = 10;

pub struct SpectralAnalyzer {
    sample_rate: u32,
    n_fft: usize,
    cepstral_coeffs: usize,
    stft: StftEngine,
    cep_fft: Arc<dyn Fft<f32>>,
    cep_ifft: Arc<dyn Fft<f32>>,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: u32, n_fft: usize, hop_length: usize, cepstral_coeffs: usize) -> Self {
        let bins = n_fft / 2 + 1;
        let mut planner = FftPlanner::<f32>::new();
        Self {
            sample_rate,
            n_fft,
            cepstral_coeffs,
            stft: StftEngine::new(n_fft, hop_length),
            cep_fft: planner.plan_fft_forward(bins),
            cep_ifft: planner.plan_fft_inverse(bins),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn analyze(&self, y: &[f32]) -> SpectralFeatures {
        let magnitude = StftEngine::magnitude(&self.stft.forward(y));
        let envelope = self.compute_envelope(&magnitude);
        let spectral_tilt = self.compute_tilt(&magnitude);
        SpectralFeatures {
            envelope,
            spectral_tilt,
        }
    }

    /// Energy concentrated around multiples of the per-frame F0.
    ///
    /// Returns `(harmonic_energy, harmonic_ratios)`, zero for unvoiced or
    /// out-of-range frames.
    pub fn harmonic_stats(&self, y: &[f32], f0: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let magnitude = StftEngine::magnitude(&self.stft.forward(y));
        let bins = self.stft.bins();
        let bin_hz = self.sample_rate as f32 / self.n_fft as f32;
        let top_hz = (bins - 1) as f32 * bin_hz;

        let n_frames = magnitude.len().min(f0.len());
        let mut energy = vec![0.0f32; n_frames];
        let mut ratios = vec![0.0f32; n_frames];
        let mut mask = vec![false; bins];

        for t in 0..n_frames {
            if !(f0[t] > MIN_F0_HZ) {
                continue;
            }
            mask.fill(false);
            for h in 1..=HARMONIC_COUNT {
                let center = h as f32 * f0[t];
                if center > top_hz {
                    break;
                }
                let idx = ((center / bin_hz).round() as usize).min(bins - 1);
                let width = ((idx as f32 * 0.05) as usize).max(1);
                let lo = idx.saturating_sub(width);
                let hi = (idx + width).min(bins - 1);
                for m in &mut mask[lo..=hi] {
                    *m = true;
                }
            }

            let mut total = 0.0f32;
            let mut harmonic = 0.0f32;
            for (k, &m) in magnitude[t].iter().enumerate() {
                let p = m * m;
                total += p;
                if mask[k] {
                    harmonic += p;
                }
            }
            energy[t] = harmonic;
            ratios[t] = safe_div(harmonic, total, 0.0);
        }
        (energy, ratios)
    }

    /// Cepstral envelope per frame, `[frame][bin]`.
    fn compute_envelope(&self, magnitude: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let bins = self.stft.bins();
        let inv_bins = 1.0 / bins as f32;
        let mut fwd_scratch = vec![Complex::default(); self.cep_fft.get_inplace_scratch_len()];
        let mut inv_scratch = vec![Complex::default(); self.cep_ifft.get_inplace_scratch_len()];
        let mut buf = vec![Complex::default(); bins];

        magnitude
            .iter()
            .map(|frame| {
                for k in 0..bins {
                    buf[k] = Complex::new(safe_ln(frame[k] + EPSILON), 0.0);
                }
                self.cep_fft.process_with_scratch(&mut buf, &mut fwd_scratch);
                for k in 0..bins {
                    if k.min(bins - k) >= self.cepstral_coeffs {
                        buf[k] = Complex::default();
                    }
                }
                self.cep_ifft.process_with_scratch(&mut buf, &mut inv_scratch);
                buf.iter().map(|c| (c.re * inv_bins).exp()).collect()
            })
            .collect()
    }

    /// Slope of log magnitude against log frequency on the time-averaged
    /// spectrum; 0 when the fitting band is too sparse.
    fn compute_tilt(&self, magnitude: &[Vec<f32>]) -> f32 {
        if magnitude.is_empty() {
            return 0.0;
        }
        let bins = self.stft.bins();
        let bin_hz = self.sample_rate as f32 / self.n_fft as f32;
        let inv_frames = 1.0 / magnitude.len() as f32;

        let mut x = Vec::new();
        let mut y = Vec::new();
        for k in 0..bins {
            let freq = k as f32 * bin_hz;
            if freq > TILT_BAND_LOW_HZ && freq < TILT_BAND_HIGH_HZ {
                let avg: f32 = magnitude.iter().map(|frame| frame[k]).sum::<f32>() * inv_frames;
                x.push(freq.ln());
                y.push(safe_ln(avg + EPSILON));
            }
        }
        if x.len() < TILT_MIN_BINS {
            return 0.0;
        }
        polyfit_linear(&x, &y).0
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

    fn analyzer() -> SpectralAnalyzer {
        SpectralAnalyzer::new(44100, 2048, 512, 20)
    }

    #[test]
    fn test_envelope_strictly_positive() {
        let a = analyzer();
        let features = a.analyze(&sine(440.0, 44100, 8192));
        assert!(!features.envelope.is_empty());
        for frame in &features.envelope {
            assert_eq!(frame.len(), 1025);
            assert!(frame.iter().all(|&v| v > 0.0));
        }
    }

    #[test]
    fn test_silence_has_zero_tilt_and_positive_envelope() {
        let a = analyzer();
        let features = a.analyze(&vec![0.0; 8192]);
        assert_eq!(features.spectral_tilt, 0.0);
        for frame in &features.envelope {
            assert!(frame.iter().all(|&v| v > 0.0));
        }
    }

    #[test]
    fn test_tilt_is_finite_for_tonal_input() {
        let a = analyzer();
        let features = a.analyze(&sine(440.0, 44100, 16384));
        assert!(features.spectral_tilt.is_finite());
    }

    #[test]
    fn test_harmonic_ratio_high_for_voiced_sine() {
        let a = analyzer();
        let y = sine(440.0, 44100, 8192);
        let n_frames = 13; // matches STFT frame count for 8192 samples
        let f0 = vec![440.0f32; n_frames];
        let (energy, ratios) = a.harmonic_stats(&y, &f0);
        assert_eq!(energy.len(), ratios.len());
        for (t, &r) in ratios.iter().enumerate() {
            assert!(r > 0.5, "frame {t} ratio {r}");
            assert!(energy[t] > 0.0);
            assert!(r <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_harmonic_stats_zero_for_unvoiced() {
        let a = analyzer();
        let y = sine(440.0, 44100, 8192);
        let f0 = vec![f32::NAN; 13];
        let (energy, ratios) = a.harmonic_stats(&y, &f0);
        assert!(energy.iter().all(|&v| v == 0.0));
        assert!(ratios.iter().all(|&v| v == 0.0));
    }
}
