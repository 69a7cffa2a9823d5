//! Pitch and formant shifting in the time and frequency domains.
//!
//! Pitch is shifted by time-domain resampling, which moves formants along
//! with it; the magnitude-domain formant warp is the separate compensation
//! step. The tilt matcher applies a log-frequency-linear correction curve
//! normalized to unity at 1 kHz.

use crate::constants::EPSILON;
use crate::dsp::math::{interp_at, polyfit_linear, safe_ln};

/// Shifts below this many semitones are treated as identity.
const MIN_SEMITONES: f32 = 0.01;

/// Warp factors within this distance of 1.0 are treated as identity.
const MIN_FACTOR_DELTA: f32 = 0.01;

/// Bins required in the fitting band before tilt correction engages.
const TILT_MIN_BINS: usize = 10;

pub struct SpectralShifter {
    sample_rate: u32,
    n_fft: usize,
    freq_bins: Vec<f32>,
}

impl SpectralShifter {
    pub fn new(sample_rate: u32, n_fft: usize) -> Self {
        let bins = n_fft / 2 + 1;
        let bin_hz = sample_rate as f32 / n_fft as f32;
        Self {
            sample_rate,
            n_fft,
            freq_bins: (0..bins).map(|k| k as f32 * bin_hz).collect(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pitch shift by linear-interpolation resampling.
    ///
    /// Produces `len / 2^(semitones/12)` samples. Formants shift along with
    /// the pitch; apply [`shift_formants`](Self::shift_formants) afterwards
    /// to compensate.
    pub fn shift_pitch(&self, y: &[f32], semitones: f32) -> Vec<f32> {
        if semitones.abs() < MIN_SEMITONES {
            return y.to_vec();
        }
        let factor = 2.0f32.powf(semitones / 12.0);
        let mut out = Vec::with_capacity((y.len() as f32 / factor).ceil() as usize + 1);
        let mut pos = 0.0f32;
        while pos < y.len() as f32 {
            out.push(interp_at(y, pos));
            pos += factor;
        }
        out
    }

    /// Stretch the frequency axis of a magnitude matrix by `shift_factor`.
    ///
    /// Output bin `k` reads source position `min(k * factor, K - 1)` with
    /// linear interpolation; frames are processed independently.
    pub fn shift_formants(&self, magnitude: &[Vec<f32>], shift_factor: f32) -> Vec<Vec<f32>> {
        if (shift_factor - 1.0).abs() < MIN_FACTOR_DELTA {
            return magnitude.to_vec();
        }
        magnitude
            .iter()
            .map(|frame| {
                let top = frame.len().saturating_sub(1) as f32;
                (0..frame.len())
                    .map(|k| interp_at(frame, (k as f32 * shift_factor).min(top)))
                    .collect()
            })
            .collect()
    }

    /// Correct the average spectral tilt towards `target_tilt`.
    ///
    /// No-op when the fitting band holds too few bins for a stable slope.
    pub fn match_spectral_tilt(&self, magnitude: &[Vec<f32>], target_tilt: f32) -> Vec<Vec<f32>> {
        if magnitude.is_empty() {
            return magnitude.to_vec();
        }
        let inv_frames = 1.0 / magnitude.len() as f32;

        let mut x = Vec::new();
        let mut y = Vec::new();
        for (k, &freq) in self.freq_bins.iter().enumerate() {
            if freq > 100.0 && freq < 8000.0 {
                let avg: f32 = magnitude.iter().map(|frame| frame[k]).sum::<f32>() * inv_frames;
                x.push(freq.ln());
                y.push(safe_ln(avg + EPSILON));
            }
        }
        if x.len() < TILT_MIN_BINS {
            return magnitude.to_vec();
        }
        let (current_slope, _) = polyfit_linear(&x, &y);
        let diff_slope = target_tilt - current_slope;

        let mut correction: Vec<f32> = self
            .freq_bins
            .iter()
            .map(|&f| (diff_slope * (f + EPSILON).ln()).exp())
            .collect();

        // Normalize so the correction is unity at 1 kHz.
        let bin_hz = self.sample_rate as f32 / self.n_fft as f32;
        let idx_1k = ((1000.0 / bin_hz).round() as usize).min(correction.len() - 1);
        let anchor = correction[idx_1k] + EPSILON;
        for c in &mut correction {
            *c /= anchor;
        }

        magnitude
            .iter()
            .map(|frame| {
                frame
                    .iter()
                    .zip(correction.iter())
                    .map(|(&m, &c)| m * c)
                    .collect()
            })
            .collect()
    }
}
