//! Real-time chunked voice conversion.
//!
//! A single-threaded overlap-add processor with fixed shift parameters:
//! input samples accumulate in a ring buffer, every completed hop is
//! windowed, warped in the frequency domain and overlap-added back. No
//! matching and no iterative phase reconstruction; latency is one frame.
//!
//! The overlap-add gain is computed from the actual window sum for the
//! configured hop, so reconstruction stays unity-gain for every preset's
//! hop divisor.

use std::sync::Arc;

use ringbuf::{Consumer, Producer, RingBuffer};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::{ConversionQuality, QualitySettings};
use crate::constants::DEFAULT_N_FFT;
use crate::dsp::math::{hann_window, interp_at};

/// Ring capacity relative to the frame size.
const RINGBUF_CAP_MULT: usize = 4;

/// Shifts below these thresholds leave the frame untouched.
const MIN_SEMITONES: f32 = 0.01;
const MIN_FACTOR_DELTA: f32 = 0.01;

pub struct VoiceStreamProcessor {
    sample_rate: u32,
    pitch_shift: f32,
    formant_shift: f32,
    n_fft: usize,
    hop_length: usize,

    input_prod: Producer<f32>,
    input_cons: Consumer<f32>,
    output_prod: Producer<f32>,
    output_cons: Consumer<f32>,

    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,

    // Scratch
    history: Vec<f32>,
    overlap: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    ifft_scratch: Vec<Complex<f32>>,
    magnitude: Vec<f32>,
    warped: Vec<f32>,
    phase: Vec<f32>,
    window: Vec<f32>,
    ola_gain: f32,
}

impl VoiceStreamProcessor {
    pub fn new(
        sample_rate: u32,
        pitch_shift: f32,
        formant_shift: f32,
        quality: ConversionQuality,
    ) -> Self {
        let settings = QualitySettings::from_preset(quality);
        let n_fft = DEFAULT_N_FFT;
        let hop_length = settings.hop_length(n_fft);

        let cap = n_fft * RINGBUF_CAP_MULT;
        let (input_prod, input_cons) = RingBuffer::new(cap).split();
        let (output_prod, output_cons) = RingBuffer::new(cap).split();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let ifft = planner.plan_fft_inverse(n_fft);
        let fft_scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        let ifft_scratch = vec![Complex::default(); ifft.get_inplace_scratch_len()];

        let window = hann_window(n_fft);
        let window_sum: f32 = window.iter().sum();
        let bins = n_fft / 2 + 1;

        Self {
            sample_rate,
            pitch_shift,
            formant_shift,
            n_fft,
            hop_length,
            input_prod,
            input_cons,
            output_prod,
            output_cons,
            fft,
            ifft,
            history: vec![0.0; n_fft],
            overlap: vec![0.0; n_fft],
            spectrum: vec![Complex::default(); n_fft],
            fft_scratch,
            ifft_scratch,
            magnitude: vec![0.0; bins],
            warped: vec![0.0; bins],
            phase: vec![0.0; bins],
            window,
            ola_gain: hop_length as f32 / window_sum,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Feed a chunk; returns the output samples for every hop completed by
    /// this chunk. Partial data stays buffered for the next call.
    pub fn process_chunk(&mut self, chunk: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(chunk.len() + self.hop_length);
        for &sample in chunk {
            let _ = self.input_prod.push(sample);
            if self.input_cons.len() >= self.hop_length {
                self.consume_hop();
                self.process_frame();
                for _ in 0..self.hop_length {
                    out.push(self.output_cons.pop().unwrap_or(0.0));
                }
            }
        }
        out
    }

    /// Process the buffered remainder and return the residual tail, then
    /// zero all internal state.
    pub fn flush(&mut self) -> Vec<f32> {
        let mut out = Vec::new();
        if self.input_cons.len() > 0 {
            while self.input_cons.len() < self.hop_length {
                let _ = self.input_prod.push(0.0);
            }
            self.consume_hop();
            self.process_frame();
            for _ in 0..self.hop_length {
                out.push(self.output_cons.pop().unwrap_or(0.0));
            }
        }
        out.extend_from_slice(&self.overlap[..self.n_fft - self.hop_length]);
        self.reset();
        out
    }

    /// Zero all buffers; the processor behaves as freshly constructed.
    pub fn reset(&mut self) {
        while self.input_cons.pop().is_some() {}
        while self.output_cons.pop().is_some() {}
        self.history.fill(0.0);
        self.overlap.fill(0.0);
    }

    /// Slide one hop of input into the frame history.
    fn consume_hop(&mut self) {
        self.history.copy_within(self.hop_length.., 0);
        let tail_start = self.n_fft - self.hop_length;
        for i in 0..self.hop_length {
            self.history[tail_start + i] = self.input_cons.pop().unwrap_or(0.0);
        }
    }

    fn process_frame(&mut self) {
        let passthrough = self.pitch_shift.abs() < MIN_SEMITONES
            && (self.formant_shift - 1.0).abs() < MIN_FACTOR_DELTA;

        if passthrough {
            for i in 0..self.n_fft {
                self.overlap[i] += self.history[i] * self.window[i] * self.ola_gain;
            }
        } else {
            let bins = self.n_fft / 2 + 1;

            // 1) Window + FFT
            for i in 0..self.n_fft {
                self.spectrum[i] = Complex::new(self.history[i] * self.window[i], 0.0);
            }
            self.fft
                .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);

            for k in 0..bins {
                self.magnitude[k] = self.spectrum[k].norm();
                self.phase[k] = self.spectrum[k].arg();
            }

            // 2) Formant warp: output bin reads source bin k * factor.
            if (self.formant_shift - 1.0).abs() >= MIN_FACTOR_DELTA {
                let top = (bins - 1) as f32;
                for k in 0..bins {
                    self.warped[k] =
                        interp_at(&self.magnitude, (k as f32 * self.formant_shift).min(top));
                }
                self.magnitude.copy_from_slice(&self.warped);
            }

            // 3) Pitch warp: output bin reads source bin k / factor.
            if self.pitch_shift.abs() >= MIN_SEMITONES {
                let factor = 2.0f32.powf(self.pitch_shift / 12.0);
                for k in 0..bins {
                    let src = k as f32 / factor;
                    self.warped[k] = if src < bins as f32 {
                        interp_at(&self.magnitude, src)
                    } else {
                        0.0
                    };
                }
                self.magnitude.copy_from_slice(&self.warped);
            }

            // 4) Rebuild spectrum with original phase + conjugate symmetry
            for k in 0..bins {
                self.spectrum[k] = Complex::from_polar(self.magnitude[k], self.phase[k]);
            }
            for k in 1..(self.n_fft / 2) {
                self.spectrum[self.n_fft - k] = self.spectrum[k].conj();
            }

            // 5) iFFT + overlap-add
            self.ifft
                .process_with_scratch(&mut self.spectrum, &mut self.ifft_scratch);
            let norm = self.ola_gain / self.n_fft as f32;
            for i in 0..self.n_fft {
                self.overlap[i] += self.spectrum[i].re * norm;
            }
        }

        // Emit one hop, then slide the accumulator.
        for i in 0..self.hop_length {
            let _ = self.output_prod.push(self.overlap[i]);
        }
        self.overlap.copy_within(self.hop_length.., 0);
        let tail_start = self.n_fft - self.hop_length;
        for v in &mut self.overlap[tail_start..] {
            *v = 0.0;
        }
    }
}

#[cfg(feature = "server")]
pub use async_wrapper::AsyncStreamProcessor;

#[cfg(feature = "server")]
mod async_wrapper {
    use super::VoiceStreamProcessor;
    use crate::error::{ConversionError, VoicoError};

    /// Offloads each chunk to a blocking worker thread. One chunk is in
    /// flight at a time, so output ordering matches input ordering.
    pub struct AsyncStreamProcessor {
        inner: Option<VoiceStreamProcessor>,
    }

    impl AsyncStreamProcessor {
        pub fn new(inner: VoiceStreamProcessor) -> Self {
            Self { inner: Some(inner) }
        }

        pub async fn process_chunk(&mut self, chunk: Vec<f32>) -> Result<Vec<f32>, VoicoError> {
            let inner = self.take_inner()?;
            let (inner, out) = tokio::task::spawn_blocking(move || {
                let mut inner = inner;
                let out = inner.process_chunk(&chunk);
                (inner, out)
            })
            .await
            .map_err(join_error)?;
            self.inner = Some(inner);
            Ok(out)
        }

        pub async fn flush(&mut self) -> Result<Vec<f32>, VoicoError> {
            let inner = self.take_inner()?;
            let (inner, out) = tokio::task::spawn_blocking(move || {
                let mut inner = inner;
                let out = inner.flush();
                (inner, out)
            })
            .await
            .map_err(join_error)?;
            self.inner = Some(inner);
            Ok(out)
        }

        fn take_inner(&mut self) -> Result<VoiceStreamProcessor, VoicoError> {
            self.inner.take().ok_or_else(|| {
                ConversionError::Validation {
                    message: "stream processor unavailable after a failed worker".to_string(),
                    suggestions: vec!["Create a new stream processor".to_string()],
                }
                .into()
            })
        }
    }

    fn join_error(e: tokio::task::JoinError) -> VoicoError {
        ConversionError::Validation {
            message: format!("streaming worker thread failed: {e}"),
            suggestions: vec![],
        }
        .into()
    }
}
