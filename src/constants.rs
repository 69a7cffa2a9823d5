//! Shared audio constants used across the analysis and synthesis stages.

/// Lowest fundamental frequency considered voiced speech (Hz).
pub const MIN_F0_HZ: f32 = 50.0;

/// Highest fundamental frequency considered voiced speech (Hz).
pub const MAX_F0_HZ: f32 = 600.0;

/// Default FFT size for spectral analysis and resynthesis.
pub const DEFAULT_N_FFT: usize = 2048;

/// Sample rate formant analysis is carried out at. LPC behaves best when
/// the spectrum only covers the formant region.
pub const FORMANT_ANALYSIS_SR: u32 = 10_000;

/// Below this F0 the LPC order is raised to resolve closely spaced harmonics.
pub const PITCH_THRESHOLD_LOW: f32 = 120.0;

/// LPC order used for low-pitched frames.
pub const LPC_ORDER_LOW_PITCH: usize = 16;

/// Roots with a wider bandwidth than this are not formants.
pub const MAX_FORMANT_BANDWIDTH: f32 = 400.0;

/// Guard value for divisions and logarithms.
pub const EPSILON: f32 = 1e-10;

/// Fallback formant frequencies when a track has no valid frames (Hz).
pub const DEFAULT_FORMANT_FREQS: [f32; 5] = [500.0, 1500.0, 2500.0, 3500.0, 4500.0];

/// Fallback formant bandwidths matching [`DEFAULT_FORMANT_FREQS`] (Hz).
pub const DEFAULT_FORMANT_BANDWIDTHS: [f32; 5] = [80.0, 100.0, 120.0, 150.0, 200.0];
