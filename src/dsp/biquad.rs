//! Biquad Filter Implementation (IIR 2nd Order)
//!
//! RBJ-style second-order sections used for anti-alias filtering ahead of
//! the formant analysis decimator. Two cascaded sections with Butterworth Q
//! values form the 4th-order low-pass; running the cascade forward and
//! backward makes it zero-phase.

use std::f32::consts::PI;

/// Q values of the two second-order sections of a 4th-order Butterworth.
const BUTTERWORTH_Q4: [f32; 2] = [0.5412, 1.3066];

/// Biquad filter (IIR 2nd order)
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn new() -> Self {
        Self {
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
            b1: 0.0,
            b2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Process a single sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = input * self.a0 + self.z1;

        // Anti-denormal: tiny DC offset
        self.z1 = input * self.a1 + self.z2 - self.b1 * out + 1e-25;
        self.z2 = input * self.a2 - self.b2 * out + 1e-25;

        out
    }

    /// Clear filter delay state. Not called by coefficient updates; use it
    /// between independent passes for deterministic output.
    #[inline]
    pub fn reset_state(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    pub fn update_lpf(&mut self, cutoff: f32, q: f32, sr: f32) {
        let w0 = 2.0 * PI * cutoff / sr;
        let alpha = w0.sin() / (2.0 * q.max(1e-6));
        let cw0 = w0.cos();

        let a0 = 1.0 + alpha;
        let inv_a0 = 1.0 / a0;

        self.a0 = ((1.0 - cw0) * 0.5) * inv_a0;
        self.a1 = (1.0 - cw0) * inv_a0;
        self.a2 = ((1.0 - cw0) * 0.5) * inv_a0;
        self.b1 = (-2.0 * cw0) * inv_a0;
        self.b2 = (1.0 - alpha) * inv_a0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

/// 4th-order Butterworth low-pass applied forward and backward (zero phase).
pub fn zero_phase_lowpass(samples: &[f32], cutoff: f32, sr: f32) -> Vec<f32> {
    let mut cascade: Vec<Biquad> = BUTTERWORTH_Q4
        .iter()
        .map(|&q| {
            let mut bq = Biquad::new();
            bq.update_lpf(cutoff, q, sr);
            bq
        })
        .collect();

    let mut out = samples.to_vec();

    // Forward pass
    for v in &mut out {
        let mut s = *v;
        for bq in &mut cascade {
            s = bq.process(s);
        }
        *v = s;
    }

    // Backward pass with cleared state
    out.reverse();
    for bq in &mut cascade {
        bq.reset_state();
    }
    for v in &mut out {
        let mut s = *v;
        for bq in &mut cascade {
            s = bq.process(s);
        }
        *v = s;
    }
    out.reverse();

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn band_rms(samples: &[f32]) -> f32 {
        let sum: f32 = samples.iter().map(|v| v * v).sum();
        (sum / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_lowpass_passes_low_blocks_high() {
        let sr = 44100.0;
        let n = 8192;
        let low: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * 200.0 * i as f32 / sr).sin())
            .collect();
        let high: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * 15000.0 * i as f32 / sr).sin())
            .collect();

        let low_out = zero_phase_lowpass(&low, 5000.0, sr);
        let high_out = zero_phase_lowpass(&high, 5000.0, sr);

        // Interior only, the passes smear the edges a little.
        let lo_rms = band_rms(&low_out[1024..n - 1024]);
        let hi_rms = band_rms(&high_out[1024..n - 1024]);
        assert!(lo_rms > 0.6, "low band attenuated: {lo_rms}");
        assert!(hi_rms < 0.05, "high band leaked: {hi_rms}");
    }

    #[test]
    fn test_zero_phase_preserves_length() {
        let samples = vec![0.25; 100];
        assert_eq!(zero_phase_lowpass(&samples, 5000.0, 44100.0).len(), 100);
    }
}
