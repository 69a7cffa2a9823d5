//! LPC formant estimator.
//!
//! The input is decimated to [`FORMANT_ANALYSIS_SR`] behind a zero-phase
//! Butterworth anti-alias filter, then analyzed in 25 ms pre-emphasized
//! Hamming frames. Levinson-Durbin solves the all-pole model; the poles of
//! the prediction polynomial give per-frame formant frequencies and
//! bandwidths. Frames where the recursion degenerates are left as zeros.

use rustfft::num_complex::Complex;

use crate::constants::{
    DEFAULT_FORMANT_BANDWIDTHS, DEFAULT_FORMANT_FREQS, EPSILON, FORMANT_ANALYSIS_SR,
    LPC_ORDER_LOW_PITCH, MAX_FORMANT_BANDWIDTH, PITCH_THRESHOLD_LOW,
};
use crate::dsp::biquad::zero_phase_lowpass;
use crate::dsp::math::{hamming_window, median, median_filter};
use crate::types::FormantTrack;

/// Pre-emphasis coefficient applied before windowing.
const PRE_EMPHASIS: f32 = 0.97;

/// Analysis frame duration in seconds.
const FRAME_SECONDS: f32 = 0.025;

pub struct FormantAnalyzer {
    sample_rate: u32,
    n_formants: usize,
    lpc_order: usize,
    median_kernel: usize,
}

impl FormantAnalyzer {
    pub fn new(sample_rate: u32, lpc_order: usize, median_kernel: usize) -> Self {
        Self {
            sample_rate,
            n_formants: 5,
            lpc_order,
            median_kernel: median_kernel | 1,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Track formants over the frames of `f0` (one output column per entry).
    pub fn analyze(&self, audio: &[f32], f0: &[f32]) -> FormantTrack {
        log::debug!("starting formant analysis over {} frames", f0.len());

        let analysis_sr = FORMANT_ANALYSIS_SR;
        let resampled = self.decimate(audio, analysis_sr);

        let n_frames = f0.len();
        let mut frequencies = vec![vec![0.0f32; n_frames]; self.n_formants];
        let mut bandwidths = vec![vec![0.0f32; n_frames]; self.n_formants];

        let frame_length = (FRAME_SECONDS * analysis_sr as f32) as usize;
        let analysis_hop = if n_frames > 0 {
            (resampled.len() / n_frames).max(1)
        } else {
            1
        };

        let mut skipped_frames = 0usize;
        for t in 0..n_frames {
            let mut start = t * analysis_hop;
            let mut end = start + frame_length;
            if end > resampled.len() {
                end = resampled.len();
                start = end.saturating_sub(frame_length);
            }
            if end <= start || end - start < self.lpc_order + 2 {
                continue;
            }

            // Pre-emphasis, then Hamming window, in f64 for the recursion.
            let src = &resampled[start..end];
            let window = hamming_window(src.len());
            let mut frame = Vec::with_capacity(src.len());
            frame.push((src[0] * window[0]) as f64);
            for n in 1..src.len() {
                frame.push(((src[n] - PRE_EMPHASIS * src[n - 1]) * window[n]) as f64);
            }

            let mut order = if f0[t].is_finite() && f0[t] < PITCH_THRESHOLD_LOW {
                LPC_ORDER_LOW_PITCH
            } else {
                self.lpc_order
            };
            order = order.min(frame.len() - 2);

            let Some(coeffs) = levinson_durbin(&frame, order) else {
                skipped_frames += 1;
                continue;
            };

            let (freqs, bws) = lpc_to_formants(&coeffs, analysis_sr as f32);
            for (i, (&f, &bw)) in freqs.iter().zip(bws.iter()).take(self.n_formants).enumerate() {
                frequencies[i][t] = f;
                bandwidths[i][t] = bw;
            }
        }

        if skipped_frames > 0 {
            log::warn!(
                "skipped {}/{} formant frames (LPC did not converge)",
                skipped_frames,
                n_frames
            );
        }

        self.smooth_tracks(&mut frequencies);

        let (mean_frequencies, mean_bandwidths) = self.track_means(&frequencies, &bandwidths);

        if !mean_frequencies.is_empty() {
            log::debug!(
                "formant analysis complete: F1={:.0}Hz F2={:.0}Hz",
                mean_frequencies[0],
                mean_frequencies.get(1).copied().unwrap_or(0.0)
            );
        }

        FormantTrack {
            frequencies,
            bandwidths,
            mean_frequencies,
            mean_bandwidths,
        }
    }

    /// Integer-ratio decimation behind a zero-phase anti-alias filter.
    fn decimate(&self, audio: &[f32], analysis_sr: u32) -> Vec<f32> {
        let ratio = ((self.sample_rate / analysis_sr) as usize).max(1);
        if ratio <= 1 {
            return audio.to_vec();
        }
        let cutoff = 0.5 * analysis_sr as f32;
        let filtered = if cutoff < 0.5 * self.sample_rate as f32 {
            zero_phase_lowpass(audio, cutoff, self.sample_rate as f32)
        } else {
            audio.to_vec()
        };
        filtered.iter().step_by(ratio).copied().collect()
    }

    /// Median-filter each formant row over its valid (non-zero) frames.
    fn smooth_tracks(&self, frequencies: &mut [Vec<f32>]) {
        for row in frequencies.iter_mut() {
            let valid_idx: Vec<usize> = (0..row.len()).filter(|&t| row[t] > 0.0).collect();
            if valid_idx.len() <= 5 {
                continue;
            }
            let kernel = self.median_kernel.min(valid_idx.len() / 2 * 2 + 1);
            if kernel < 3 {
                continue;
            }
            let values: Vec<f32> = valid_idx.iter().map(|&t| row[t]).collect();
            let filtered = median_filter(&values, kernel);
            for (&t, &v) in valid_idx.iter().zip(filtered.iter()) {
                row[t] = v;
            }
        }
    }

    /// Row medians over valid frames, with indexed defaults for empty rows.
    fn track_means(
        &self,
        frequencies: &[Vec<f32>],
        bandwidths: &[Vec<f32>],
    ) -> (Vec<f32>, Vec<f32>) {
        let mut mean_freqs = Vec::with_capacity(self.n_formants);
        let mut mean_bws = Vec::with_capacity(self.n_formants);
        for i in 0..self.n_formants {
            let valid: Vec<usize> = (0..frequencies[i].len())
                .filter(|&t| frequencies[i][t] > 0.0)
                .collect();
            if !valid.is_empty() {
                let freqs: Vec<f32> = valid.iter().map(|&t| frequencies[i][t]).collect();
                let bws: Vec<f32> = valid.iter().map(|&t| bandwidths[i][t]).collect();
                mean_freqs.push(median(&freqs));
                mean_bws.push(median(&bws));
            } else if i < DEFAULT_FORMANT_FREQS.len() {
                mean_freqs.push(DEFAULT_FORMANT_FREQS[i]);
                mean_bws.push(DEFAULT_FORMANT_BANDWIDTHS[i]);
            } else {
                mean_freqs.push(500.0 * (i + 1) as f32);
                mean_bws.push(100.0);
            }
        }
        (mean_freqs, mean_bws)
    }
}

/// Levinson-Durbin recursion on the biased autocorrelation.
///
/// Returns the prediction polynomial `[1, a1, .., a_order]`, or None when
/// the frame has no energy or the recursion loses positive definiteness.
fn levinson_durbin(frame: &[f64], order: usize) -> Option<Vec<f64>> {
    let n = frame.len();
    let mut r = vec![0.0f64; order + 1];
    for k in 0..=order {
        let mut acc = 0.0;
        for i in 0..(n - k) {
            acc += frame[i] * frame[i + k];
        }
        r[k] = acc;
    }

    if r[0] < EPSILON as f64 {
        return None;
    }

    let mut a = vec![0.0f64; order + 1];
    a[0] = 1.0;
    let mut err = r[0];

    for i in 1..=order {
        let mut acc = -r[i];
        for j in 1..i {
            acc -= a[j] * r[i - j];
        }
        let k = acc / err;

        let mut updated = a.clone();
        for j in 1..i {
            updated[j] = a[j] + k * a[i - j];
        }
        updated[i] = k;
        a = updated;

        err *= 1.0 - k * k;
        if err <= 0.0 {
            return None;
        }
    }
    Some(a)
}

/// Convert prediction polynomial poles to (frequency, bandwidth) pairs,
/// ascending in frequency.
fn lpc_to_formants(coeffs: &[f64], sample_rate: f32) -> (Vec<f32>, Vec<f32>) {
    let roots = polynomial_roots(coeffs);

    let mut pairs: Vec<(f32, f32)> = roots
        .into_iter()
        .filter(|root| root.im >= 0.0)
        .filter_map(|root| {
            let angle = root.im.atan2(root.re);
            let freq = (angle * sample_rate as f64 / (2.0 * std::f64::consts::PI)) as f32;
            let bw = (-(sample_rate as f64) / (2.0 * std::f64::consts::PI)
                * (root.norm() + EPSILON as f64).ln()) as f32;
            let nyquist = sample_rate / 2.0;
            if freq > 90.0 && freq < nyquist - 50.0 && bw > 0.0 && bw < MAX_FORMANT_BANDWIDTH {
                Some((freq, bw))
            } else {
                None
            }
        })
        .collect();

    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    pairs.into_iter().unzip()
}

/// Durand-Kerner root finder for a monic-normalizable real polynomial
/// `c[0] z^d + c[1] z^(d-1) + .. + c[d]`.
fn polynomial_roots(coeffs: &[f64]) -> Vec<Complex<f64>> {
    let degree = coeffs.len().saturating_sub(1);
    if degree == 0 || coeffs[0].abs() < 1e-300 {
        return Vec::new();
    }

    let monic: Vec<Complex<f64>> = coeffs
        .iter()
        .map(|&c| Complex::new(c / coeffs[0], 0.0))
        .collect();

    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex<f64>> = (0..degree).map(|k| seed.powu(k as u32 + 1)).collect();

    for _ in 0..60 {
        let mut max_step = 0.0f64;
        for i in 0..degree {
            let p = horner(&monic, roots[i]);
            let mut denom = Complex::new(1.0, 0.0);
            for j in 0..degree {
                if j != i {
                    denom *= roots[i] - roots[j];
                }
            }
            if denom.norm_sqr() < 1e-300 {
                continue;
            }
            let step = p / denom;
            roots[i] -= step;
            max_step = max_step.max(step.norm());
        }
        if max_step < 1e-10 {
            break;
        }
    }
    roots
}

fn horner(coeffs: &[Complex<f64>], x: Complex<f64>) -> Complex<f64> {
    let mut acc = Complex::new(0.0, 0.0);
    for &c in coeffs {
        acc = acc * x + c;
    }
    acc
}
