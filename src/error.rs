//! Error taxonomy for the conversion pipeline.
//!
//! Every error carries a human-readable message and, where useful, a list of
//! recovery suggestions the front-ends print verbatim. Numeric faults inside
//! the DSP stages (singular matrices, degenerate frames) are handled locally
//! with documented fallbacks and never surface here; only I/O failures and
//! quality-gate rejections are fatal.

use thiserror::Error;

/// Top-level error for all public operations.
#[derive(Debug, Error)]
pub enum VoicoError {
    #[error("audio load failure: {message}")]
    AudioLoad {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("audio save failure: {message}")]
    AudioSave {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("unsupported format: {message}")]
    UnsupportedFormat {
        message: String,
        suggestions: Vec<String>,
    },

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Failures while building or validating a voice profile.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("pitch detection failure: {message}")]
    Pitch {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("formant analysis failure: {message}")]
    Formant {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("spectral analysis failure: {message}")]
    Spectral {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("profile quality insufficient (score {score:.1}/100)")]
    ProfileQualityInsufficient {
        score: f32,
        issues: Vec<String>,
        suggestions: Vec<String>,
    },
}

/// Failures while applying a conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("matching failure: {message}")]
    Matching {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("validation failure: {message}")]
    Validation {
        message: String,
        suggestions: Vec<String>,
    },
}

impl VoicoError {
    /// Recovery suggestions attached to this error, outermost first.
    pub fn suggestions(&self) -> &[String] {
        match self {
            VoicoError::AudioLoad { suggestions, .. }
            | VoicoError::AudioSave { suggestions, .. }
            | VoicoError::UnsupportedFormat { suggestions, .. } => suggestions,
            VoicoError::Analysis(e) => e.suggestions(),
            VoicoError::Conversion(e) => e.suggestions(),
        }
    }

    /// Gate issues for quality rejections, empty otherwise.
    pub fn issues(&self) -> &[String] {
        match self {
            VoicoError::Analysis(AnalysisError::ProfileQualityInsufficient { issues, .. }) => {
                issues
            }
            _ => &[],
        }
    }
}

impl AnalysisError {
    pub fn suggestions(&self) -> &[String] {
        match self {
            AnalysisError::Pitch { suggestions, .. }
            | AnalysisError::Formant { suggestions, .. }
            | AnalysisError::Spectral { suggestions, .. }
            | AnalysisError::ProfileQualityInsufficient { suggestions, .. } => suggestions,
        }
    }
}

impl ConversionError {
    pub fn suggestions(&self) -> &[String] {
        match self {
            ConversionError::Matching { suggestions, .. }
            | ConversionError::Validation { suggestions, .. } => suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestions_surface_through_wrapper() {
        let err: VoicoError = AnalysisError::ProfileQualityInsufficient {
            score: 12.0,
            issues: vec!["low voiced ratio".to_string()],
            suggestions: vec!["record cleaner audio".to_string()],
        }
        .into();
        assert_eq!(err.suggestions().len(), 1);
        assert_eq!(err.issues().len(), 1);
        assert!(err.to_string().contains("12.0"));
    }

    #[test]
    fn test_plain_errors_have_no_issues() {
        let err = VoicoError::AudioLoad {
            message: "missing".to_string(),
            suggestions: vec![],
        };
        assert!(err.issues().is_empty());
    }
}
