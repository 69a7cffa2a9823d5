//! Short-time Fourier transform engine.
//!
//! Forward analysis produces `T x K` complex frames (`K = n_fft / 2 + 1`,
//! `T = ceil((len - n_fft) / hop) + 1` with zero padding at the tail).
//! Inverse synthesis overlap-adds windowed frames and normalizes by the
//! accumulated squared window, which makes a magnitude-unchanged round trip
//! exact over the interior for any hop that covers the signal.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::constants::EPSILON;
use crate::dsp::math::hann_window;

pub struct StftEngine {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
}

impl StftEngine {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        assert!(n_fft > 0 && hop > 0 && hop <= n_fft);
        let mut planner = FftPlanner::<f32>::new();
        Self {
            n_fft,
            hop,
            window: hann_window(n_fft),
            fft: planner.plan_fft_forward(n_fft),
            ifft: planner.plan_fft_inverse(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of positive-frequency bins per frame.
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of analysis frames for an input of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        if len <= self.n_fft {
            1
        } else {
            (len - self.n_fft + self.hop - 1) / self.hop + 1
        }
    }

    /// Forward STFT. Frames are rows, bins are columns.
    pub fn forward(&self, samples: &[f32]) -> Vec<Vec<Complex<f32>>> {
        let n_frames = self.frame_count(samples.len());
        let bins = self.bins();
        let mut scratch = vec![Complex::default(); self.fft.get_inplace_scratch_len()];
        let mut buf = vec![Complex::default(); self.n_fft];
        let mut frames = Vec::with_capacity(n_frames);

        for t in 0..n_frames {
            let start = t * self.hop;
            for i in 0..self.n_fft {
                let s = samples.get(start + i).copied().unwrap_or(0.0);
                buf[i] = Complex::new(s * self.window[i], 0.0);
            }
            self.fft.process_with_scratch(&mut buf, &mut scratch);
            frames.push(buf[..bins].to_vec());
        }
        frames
    }

    /// Inverse STFT via weighted overlap-add.
    ///
    /// `out_len` truncates or zero-pads the synthesized signal; without it
    /// the full `(T - 1) * hop + n_fft` samples are returned.
    pub fn inverse(&self, frames: &[Vec<Complex<f32>>], out_len: Option<usize>) -> Vec<f32> {
        if frames.is_empty() {
            return vec![0.0; out_len.unwrap_or(0)];
        }
        let full_len = (frames.len() - 1) * self.hop + self.n_fft;
        let mut signal = vec![0.0f32; full_len];
        let mut norm = vec![0.0f32; full_len];

        let mut scratch = vec![Complex::default(); self.ifft.get_inplace_scratch_len()];
        let mut buf = vec![Complex::default(); self.n_fft];
        let inv_n = 1.0 / self.n_fft as f32;
        let half = self.n_fft / 2;

        for (t, frame) in frames.iter().enumerate() {
            if frame.is_empty() {
                continue;
            }
            // Rebuild conjugate symmetry for the real inverse transform.
            buf[0] = frame[0];
            buf[half] = frame[half.min(frame.len() - 1)];
            for k in 1..half {
                let v = frame.get(k).copied().unwrap_or_default();
                buf[k] = v;
                buf[self.n_fft - k] = v.conj();
            }
            self.ifft.process_with_scratch(&mut buf, &mut scratch);

            let start = t * self.hop;
            for i in 0..self.n_fft {
                let w = self.window[i];
                signal[start + i] += buf[i].re * inv_n * w;
                norm[start + i] += w * w;
            }
        }

        for i in 0..full_len {
            if norm[i] > EPSILON {
                signal[i] /= norm[i];
            }
        }

        match out_len {
            Some(len) => {
                signal.resize(len, 0.0);
                signal
            }
            None => signal,
        }
    }

    /// Synthesize from a magnitude matrix and a matching phase matrix.
    pub fn inverse_from_polar(
        &self,
        magnitude: &[Vec<f32>],
        phase: &[Vec<f32>],
        out_len: Option<usize>,
    ) -> Vec<f32> {
        let frames = Self::from_polar(magnitude, phase);
        self.inverse(&frames, out_len)
    }

    pub fn magnitude(frames: &[Vec<Complex<f32>>]) -> Vec<Vec<f32>> {
        frames
            .iter()
            .map(|row| row.iter().map(|c| c.norm()).collect())
            .collect()
    }

    pub fn phase(frames: &[Vec<Complex<f32>>]) -> Vec<Vec<f32>> {
        frames
            .iter()
            .map(|row| row.iter().map(|c| c.arg()).collect())
            .collect()
    }

    pub fn from_polar(magnitude: &[Vec<f32>], phase: &[Vec<f32>]) -> Vec<Vec<Complex<f32>>> {
        magnitude
            .iter()
            .zip(phase.iter())
            .map(|(mags, args)| {
                mags.iter()
                    .zip(args.iter())
                    .map(|(&m, &p)| Complex::from_polar(m, p))
                    .collect()
            })
            .collect()
    }
}
