//! YIN pitch estimator.
//!
//! Per hop-indexed frame the cumulative-mean normalized difference function
//! is searched for the first dip under the absolute threshold, refined with
//! parabolic interpolation. The quadratic difference function is computed
//! with one FFT correlation per frame plus prefix-sum energies instead of
//! the O(N * max_lag) direct form.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::constants::{EPSILON, MAX_F0_HZ, MIN_F0_HZ};
use crate::dsp::math::{median, next_pow2, std_dev};
use crate::types::PitchContour;

/// First dip below this CMND value is taken as the period.
const YIN_THRESHOLD: f32 = 0.1;

/// Fallback ceiling for the global CMND minimum when no dip crosses the
/// absolute threshold.
const YIN_FALLBACK_THRESHOLD: f32 = 0.3;

/// Frames with confidence above this are flagged voiced.
const VOICED_CONFIDENCE: f32 = 0.3;

pub struct PitchDetector {
    sample_rate: u32,
    hop_length: usize,
    min_lag: usize,
    max_lag: usize,
    fft_len: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
}

impl PitchDetector {
    pub fn new(sample_rate: u32, hop_length: usize) -> Self {
        let min_lag = ((sample_rate as f32 / MAX_F0_HZ) as usize).max(1);
        let max_lag = ((sample_rate as f32 / MIN_F0_HZ) as usize).max(min_lag + 1);
        // Window is 2 * max_lag; correlation lags reach max_lag beyond it.
        let fft_len = next_pow2(3 * max_lag);
        let mut planner = FftPlanner::<f32>::new();
        Self {
            sample_rate,
            hop_length,
            min_lag,
            max_lag,
            fft_len,
            fft: planner.plan_fft_forward(fft_len),
            ifft: planner.plan_fft_inverse(fft_len),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Estimate the F0 contour of `y`, one value per hop.
    pub fn detect(&self, y: &[f32]) -> PitchContour {
        let n_frames = if self.hop_length > 0 {
            y.len() / self.hop_length
        } else {
            0
        };
        let window = 2 * self.max_lag;

        let mut f0 = vec![f32::NAN; n_frames];
        let mut confidence = vec![0.0f32; n_frames];

        let mut fwd_scratch = vec![Complex::default(); self.fft.get_inplace_scratch_len()];
        let mut inv_scratch = vec![Complex::default(); self.ifft.get_inplace_scratch_len()];
        let mut frame_buf = vec![Complex::default(); self.fft_len];
        let mut head_buf = vec![Complex::default(); self.fft_len];

        for t in 0..n_frames {
            let start = t * self.hop_length;
            let mut end = start + window;
            if end > y.len() {
                end = y.len();
                if end - start < 2 * self.min_lag {
                    break;
                }
            }
            let frame = &y[start..end];
            let max_lag = self.max_lag.min(frame.len() / 2);
            if max_lag <= self.min_lag {
                continue;
            }

            let d_prime = self.normalized_difference(
                frame,
                max_lag,
                &mut frame_buf,
                &mut head_buf,
                &mut fwd_scratch,
                &mut inv_scratch,
            );

            if let Some(best_tau) = pick_period(&d_prime, self.min_lag, max_lag) {
                f0[t] = self.sample_rate as f32 / best_tau;
                let tau_idx = best_tau.round() as usize;
                confidence[t] = if tau_idx < d_prime.len() {
                    (1.0 - d_prime[tau_idx]).max(0.0)
                } else {
                    0.0
                };
            }
        }

        let voiced_mask: Vec<bool> = confidence.iter().map(|&c| c > VOICED_CONFIDENCE).collect();

        let finite: Vec<f32> = f0.iter().copied().filter(|v| v.is_finite()).collect();
        let (f0_mean, f0_std) = if finite.is_empty() {
            (150.0, 0.0)
        } else {
            (median(&finite), std_dev(&finite))
        };

        let hnr_db = if finite.is_empty() {
            0.0
        } else {
            harmonic_to_noise_db(y, self.sample_rate, f0_mean)
        };

        PitchContour {
            f0,
            voiced_mask,
            f0_mean,
            f0_std,
            hnr_db,
        }
    }

    /// Cumulative-mean normalized difference function up to `max_lag`.
    ///
    /// d[tau] = E_head + E_tau - 2 * corr(tau) with the correlation against
    /// the first half of the frame carried out in the frequency domain.
    #[allow(clippy::too_many_arguments)]
    fn normalized_difference(
        &self,
        frame: &[f32],
        max_lag: usize,
        frame_buf: &mut [Complex<f32>],
        head_buf: &mut [Complex<f32>],
        fwd_scratch: &mut [Complex<f32>],
        inv_scratch: &mut [Complex<f32>],
    ) -> Vec<f32> {
        let n = frame.len();

        for i in 0..self.fft_len {
            let s = if i < n { frame[i] } else { 0.0 };
            frame_buf[i] = Complex::new(s, 0.0);
            let h = if i < max_lag { frame[i] } else { 0.0 };
            head_buf[i] = Complex::new(h, 0.0);
        }
        self.fft.process_with_scratch(frame_buf, fwd_scratch);
        self.fft.process_with_scratch(head_buf, fwd_scratch);
        for i in 0..self.fft_len {
            frame_buf[i] *= head_buf[i].conj();
        }
        self.ifft.process_with_scratch(frame_buf, inv_scratch);
        let inv_len = 1.0 / self.fft_len as f32;

        // Prefix sums of squared samples for the energy terms.
        let mut prefix = vec![0.0f64; n + 1];
        for i in 0..n {
            prefix[i + 1] = prefix[i] + (frame[i] as f64) * (frame[i] as f64);
        }
        let e_head = prefix[max_lag] as f32;

        let mut d = vec![0.0f32; max_lag + 1];
        for tau in 1..=max_lag {
            let e_tau = (prefix[tau + max_lag] - prefix[tau]) as f32;
            let corr = frame_buf[tau].re * inv_len;
            d[tau] = (e_head + e_tau - 2.0 * corr).max(0.0);
        }

        let mut d_prime = vec![1.0f32; max_lag + 1];
        let mut running_sum = 0.0f32;
        for tau in 1..=max_lag {
            running_sum += d[tau];
            if running_sum > 0.0 {
                d_prime[tau] = d[tau] * tau as f32 / running_sum;
            }
        }
        d_prime
    }
}

/// Select the period lag from the CMND curve.
///
/// First dip below the absolute threshold wins, refined parabolically when
/// both neighbors exist; otherwise the global minimum is accepted if it is
/// convincing enough.
fn pick_period(d_prime: &[f32], min_lag: usize, search_max: usize) -> Option<f32> {
    if min_lag >= search_max {
        return None;
    }

    for tau in min_lag..=search_max {
        if d_prime[tau] < YIN_THRESHOLD {
            if tau > 0 && tau < search_max {
                let alpha = d_prime[tau - 1];
                let beta = d_prime[tau];
                let gamma = d_prime[tau + 1];
                let denom = 2.0 * (alpha - 2.0 * beta + gamma);
                let delta = if denom.abs() > 1e-12 {
                    (alpha - gamma) / denom
                } else {
                    0.0
                };
                return Some(tau as f32 + delta);
            }
            return Some(tau as f32);
        }
    }

    let mut best_idx = min_lag;
    let mut best_val = d_prime[min_lag];
    for tau in min_lag..=search_max {
        if d_prime[tau] < best_val {
            best_val = d_prime[tau];
            best_idx = tau;
        }
    }
    if best_val < YIN_FALLBACK_THRESHOLD {
        Some(best_idx as f32)
    } else {
        None
    }
}

/// Harmonics-to-noise ratio from the full-signal autocorrelation at the
/// mean period, clamped to [0, 40] dB.
fn harmonic_to_noise_db(y: &[f32], sample_rate: u32, f0_mean: f32) -> f32 {
    if f0_mean <= 0.0 {
        return 0.0;
    }
    let lag = (sample_rate as f32 / f0_mean).round() as usize;
    if lag == 0 || lag >= y.len() {
        return 0.0;
    }

    let mut r0 = 0.0f64;
    for &v in y {
        r0 += (v as f64) * (v as f64);
    }
    let mut r_lag = 0.0f64;
    for i in 0..(y.len() - lag) {
        r_lag += (y[i] as f64) * (y[i + lag] as f64);
    }

    if r0 < EPSILON as f64 || r_lag <= 0.0 {
        return 0.0;
    }
    let noise = r0 - r_lag;
    if noise < EPSILON as f64 {
        return 40.0;
    }
    (10.0 * (r_lag / noise).log10() as f32).clamp(0.0, 40.0)
}
