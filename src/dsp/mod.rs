//! DSP building blocks of the conversion pipeline, organized by stage:
//!
//! ## Analysis
//! - [`pitch`] - YIN F0 tracking with voicing confidence
//! - [`formant`] - LPC formant frequency/bandwidth estimation
//! - [`spectral`] - cepstral envelope, spectral tilt, harmonic energy
//!
//! ## Synthesis
//! - [`shifter`] - time-domain pitch shift and magnitude-domain formant warp
//! - [`phase`] - Griffin-Lim and RTPGHI phase reconstruction
//!
//! ## Utilities
//! - [`stft`] - forward/inverse STFT with COLA-correct overlap-add
//! - [`biquad`] - biquad filter sections (anti-alias cascade)
//! - [`math`] - shared numeric helpers

pub mod biquad;
pub mod formant;
pub mod math;
pub mod phase;
pub mod pitch;
pub mod shifter;
pub mod spectral;
pub mod stft;

pub use biquad::Biquad;
pub use formant::FormantAnalyzer;
pub use phase::PhaseProcessor;
pub use pitch::PitchDetector;
pub use shifter::SpectralShifter;
pub use spectral::SpectralAnalyzer;
pub use stft::StftEngine;
