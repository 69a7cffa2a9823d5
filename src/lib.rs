//! Voice conversion DSP core.
//!
//! Analyzes a source voice (pitch contour, formant tracks, spectral
//! envelope), optionally matches it against a target speaker's profile,
//! and resynthesizes audio with shifted pitch and vocal-tract
//! characteristics.
//!
//! # Batch conversion
//!
//! ```no_run
//! use voico::config::ConversionQuality;
//! use voico::converter::{ConversionRequest, VoiceConverter};
//!
//! let mut converter = VoiceConverter::new(ConversionQuality::Balanced);
//! let mut request = ConversionRequest::new("in.wav", "out.wav");
//! request.pitch_shift = 2.0;
//! let report = converter.process(&request)?;
//! println!("SNR {:.1} dB", report.snr_db);
//! # Ok::<(), voico::error::VoicoError>(())
//! ```
//!
//! # Streaming
//!
//! ```
//! use voico::config::ConversionQuality;
//! use voico::stream::VoiceStreamProcessor;
//!
//! let mut stream = VoiceStreamProcessor::new(44100, 2.0, 1.0, ConversionQuality::Fast);
//! let output = stream.process_chunk(&vec![0.0f32; 512]);
//! let tail = stream.flush();
//! # let _ = (output, tail);
//! ```

pub mod audio_io;
pub mod config;
pub mod constants;
pub mod converter;
pub mod dsp;
pub mod error;
pub mod matcher;
pub mod profile;
pub mod quality;
pub mod store;
pub mod stream;
pub mod types;

#[cfg(feature = "server")]
pub mod api;

pub use config::{ConversionQuality, QualitySettings};
pub use converter::{ConversionRequest, VoiceConverter};
pub use error::VoicoError;
pub use matcher::VoiceMatcher;
pub use profile::VoiceProfileBuilder;
pub use quality::QualityScorer;
pub use stream::VoiceStreamProcessor;
pub use types::{ConversionReport, VoiceProfile};
