//! Profile validation, viability scoring and pipeline diagnostics.

pub mod diagnostic;
pub mod gates;
pub mod score;

pub use diagnostic::{DiagnosticLogger, PipelineDiagnostics};
pub use gates::{FormantGate, PitchGate, ProfileGate, ValidationResult};
pub use score::{ConversionQualityScore, QualityScorer};
