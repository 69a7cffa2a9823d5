//! Phase reconstruction from magnitude spectrograms.
//!
//! Two modes: iterative Griffin-Lim, and single-pass RTPGHI (phase gradient
//! integration over the log-magnitude's time derivative). Both draw their
//! initial phase from a caller-seedable RNG so a fixed seed makes the whole
//! pipeline deterministic.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustfft::num_complex::Complex;

use crate::dsp::stft::StftEngine;

/// Scale applied to hop^2 / n_fft for the RTPGHI phase gradient.
const RTPGHI_GAMMA_SCALE: f32 = 0.25;

/// Magnitude floor ahead of the log in RTPGHI.
const RTPGHI_MAG_FLOOR: f32 = 1e-8;

pub struct PhaseProcessor {
    n_fft: usize,
    hop_length: usize,
    stft: StftEngine,
    rng: ChaCha8Rng,
}

impl PhaseProcessor {
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        Self {
            n_fft,
            hop_length,
            stft: StftEngine::new(n_fft, hop_length),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Deterministic construction: all random phase draws derive from `seed`.
    pub fn with_seed(n_fft: usize, hop_length: usize, seed: u64) -> Self {
        Self {
            n_fft,
            hop_length,
            stft: StftEngine::new(n_fft, hop_length),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Reconstruct a time signal from `magnitude`.
    ///
    /// `n_iter == 0` selects the single-pass RTPGHI estimator; any other
    /// value runs that many Griffin-Lim iterations from random phase.
    pub fn reconstruct(&mut self, magnitude: &[Vec<f32>], n_iter: usize) -> Vec<f32> {
        if n_iter == 0 {
            self.reconstruct_rtpghi(magnitude)
        } else {
            self.griffin_lim(magnitude, n_iter, None)
        }
    }

    /// Griffin-Lim: alternate projections between the magnitude constraint
    /// and the set of consistent spectrograms.
    pub fn griffin_lim(
        &mut self,
        magnitude: &[Vec<f32>],
        n_iter: usize,
        initial_phase: Option<&[Vec<f32>]>,
    ) -> Vec<f32> {
        if magnitude.is_empty() {
            return Vec::new();
        }

        let mut frames: Vec<Vec<Complex<f32>>> = match initial_phase {
            Some(phase) => StftEngine::from_polar(magnitude, phase),
            None => magnitude
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|&m| {
                            Complex::from_polar(m, self.rng.gen_range(0.0..std::f32::consts::TAU))
                        })
                        .collect()
                })
                .collect(),
        };

        for _ in 0..n_iter {
            let audio = self.stft.inverse(&frames, None);
            let reanalyzed = self.stft.forward(&audio);
            for (t, row) in frames.iter_mut().enumerate() {
                for (k, c) in row.iter_mut().enumerate() {
                    let phase = reanalyzed[t][k].arg();
                    *c = Complex::from_polar(magnitude[t][k], phase);
                }
            }
        }

        self.stft.inverse(&frames, None)
    }

    /// RTPGHI: integrate the instantaneous frequency estimated from the
    /// time derivative of the log magnitude. Single pass, no iteration.
    pub fn reconstruct_rtpghi(&mut self, magnitude: &[Vec<f32>]) -> Vec<f32> {
        let n_frames = magnitude.len();
        if n_frames == 0 {
            return Vec::new();
        }
        let bins = magnitude[0].len();
        let gamma =
            RTPGHI_GAMMA_SCALE * (self.hop_length * self.hop_length) as f32 / self.n_fft as f32;

        let log_mag: Vec<Vec<f32>> = magnitude
            .iter()
            .map(|row| row.iter().map(|&m| m.max(RTPGHI_MAG_FLOOR).ln()).collect())
            .collect();

        // Central differences along the frame axis, one-sided at the edges.
        let dlog_dt: Vec<Vec<f32>> = (0..n_frames)
            .map(|t| {
                (0..bins)
                    .map(|k| {
                        if n_frames == 1 {
                            0.0
                        } else if t == 0 {
                            log_mag[1][k] - log_mag[0][k]
                        } else if t == n_frames - 1 {
                            log_mag[t][k] - log_mag[t - 1][k]
                        } else {
                            0.5 * (log_mag[t + 1][k] - log_mag[t - 1][k])
                        }
                    })
                    .collect()
            })
            .collect();

        let omega: Vec<f32> = (0..bins)
            .map(|k| std::f32::consts::TAU * k as f32 * self.hop_length as f32 / self.n_fft as f32)
            .collect();

        let mut phase = vec![vec![0.0f32; bins]; n_frames];
        for k in 0..bins {
            phase[0][k] = self.rng.gen_range(0.0..std::f32::consts::TAU);
        }
        for t in 1..n_frames {
            for k in 0..bins {
                phase[t][k] = phase[t - 1][k] + omega[k] + gamma * dlog_dt[t - 1][k];
            }
        }

        self.stft.inverse_from_polar(magnitude, &phase, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn magnitude_fixture() -> Vec<Vec<f32>> {
        let sr = 44100.0;
        let y: Vec<f32> = (0..4096)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / sr).sin())
            .collect();
        let stft = StftEngine::new(1024, 256);
        StftEngine::magnitude(&stft.forward(&y))
    }

    #[test]
    fn test_griffin_lim_output_length() {
        let mag = magnitude_fixture();
        let mut pp = PhaseProcessor::with_seed(1024, 256, 7);
        let y = pp.reconstruct(&mag, 4);
        assert_eq!(y.len(), (mag.len() - 1) * 256 + 1024);
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_rtpghi_output_length() {
        let mag = magnitude_fixture();
        let mut pp = PhaseProcessor::with_seed(1024, 256, 7);
        let y = pp.reconstruct(&mag, 0);
        assert_eq!(y.len(), (mag.len() - 1) * 256 + 1024);
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let mag = magnitude_fixture();
        let mut a = PhaseProcessor::with_seed(1024, 256, 42);
        let mut b = PhaseProcessor::with_seed(1024, 256, 42);
        assert_eq!(a.reconstruct(&mag, 2), b.reconstruct(&mag, 2));
        assert_eq!(a.reconstruct_rtpghi(&mag), b.reconstruct_rtpghi(&mag));
    }

    #[test]
    fn test_different_seeds_differ() {
        let mag = magnitude_fixture();
        let mut a = PhaseProcessor::with_seed(1024, 256, 1);
        let mut b = PhaseProcessor::with_seed(1024, 256, 2);
        assert_ne!(a.reconstruct(&mag, 1), b.reconstruct(&mag, 1));
    }

    #[test]
    fn test_supplied_phase_bypasses_rng() {
        let mag = magnitude_fixture();
        let phase = vec![vec![0.0f32; mag[0].len()]; mag.len()];
        let mut a = PhaseProcessor::with_seed(1024, 256, 1);
        let mut b = PhaseProcessor::with_seed(1024, 256, 99);
        assert_eq!(
            a.griffin_lim(&mag, 2, Some(&phase)),
            b.griffin_lim(&mag, 2, Some(&phase))
        );
    }

    #[test]
    fn test_empty_magnitude() {
        let mut pp = PhaseProcessor::with_seed(1024, 256, 3);
        assert!(pp.reconstruct(&[], 8).is_empty());
        assert!(pp.reconstruct_rtpghi(&[]).is_empty());
    }
}
