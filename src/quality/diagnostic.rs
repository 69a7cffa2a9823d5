//! Pipeline diagnostics.
//!
//! The converter owns one [`DiagnosticLogger`] per `process()` call and
//! records stage timings, quality scores, validation outcomes and errors
//! into it. `finalize()` runs on every exit path, including failures, so a
//! partial run still leaves a complete record.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub event_type: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub passed: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineDiagnostics {
    pub pipeline_id: String,
    pub input_file: String,
    pub output_file: String,
    pub quality_preset: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_duration_seconds: f64,
    pub stage_timings: Vec<(String, f64)>,
    pub quality_scores: Vec<(String, f32)>,
    pub validation_results: Vec<(String, ValidationRecord)>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub events: Vec<DiagnosticEvent>,
}

impl PipelineDiagnostics {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

pub struct DiagnosticLogger {
    diagnostics: PipelineDiagnostics,
    started: Instant,
}

impl DiagnosticLogger {
    pub fn new(pipeline_id: &str) -> Self {
        let mut diagnostics = PipelineDiagnostics {
            pipeline_id: pipeline_id.to_string(),
            ..PipelineDiagnostics::default()
        };
        diagnostics.start_time = Some(Utc::now());
        Self {
            diagnostics,
            started: Instant::now(),
        }
    }

    pub fn log_input(&mut self, input_file: &str, output_file: &str, quality_preset: &str) {
        self.diagnostics.input_file = input_file.to_string();
        self.diagnostics.output_file = output_file.to_string();
        self.diagnostics.quality_preset = quality_preset.to_string();
    }

    pub fn log_stage_timing(&mut self, stage: &str, duration_seconds: f64) {
        self.diagnostics
            .stage_timings
            .push((stage.to_string(), duration_seconds));
        self.log_event(stage, "stage_completed", json!({ "duration_s": duration_seconds }));
    }

    pub fn log_quality_score(&mut self, metric: &str, score: f32) {
        self.diagnostics
            .quality_scores
            .push((metric.to_string(), score));
        self.log_event(
            "quality",
            "score_recorded",
            json!({ "metric": metric, "value": score }),
        );
    }

    pub fn log_validation(&mut self, component: &str, passed: bool, issues: &[String]) {
        self.diagnostics.validation_results.push((
            component.to_string(),
            ValidationRecord {
                passed,
                issues: issues.to_vec(),
            },
        ));
        let status = if passed { "passed" } else { "failed" };
        self.log_event(
            "validation",
            &format!("validation_{status}"),
            json!({ "component": component, "issues_count": issues.len() }),
        );
    }

    pub fn log_error(&mut self, stage: &str, message: &str) {
        self.diagnostics.errors.push(message.to_string());
        self.log_event(stage, "error", json!({ "message": message }));
        log::error!("[{}] {stage}: {message}", self.diagnostics.pipeline_id);
    }

    pub fn log_warning(&mut self, stage: &str, message: &str) {
        self.diagnostics.warnings.push(message.to_string());
        self.log_event(stage, "warning", json!({ "message": message }));
        log::warn!("[{}] {stage}: {message}", self.diagnostics.pipeline_id);
    }

    pub fn log_event(&mut self, stage: &str, event_type: &str, data: serde_json::Value) {
        self.diagnostics.events.push(DiagnosticEvent {
            timestamp: Utc::now(),
            stage: stage.to_string(),
            event_type: event_type.to_string(),
            data,
        });
    }

    /// Stamp the end time and return the completed record.
    pub fn finalize(mut self) -> PipelineDiagnostics {
        self.diagnostics.end_time = Some(Utc::now());
        self.diagnostics.total_duration_seconds = self.started.elapsed().as_secs_f64();
        self.diagnostics
    }

    pub fn summary(&self) -> String {
        format!(
            "Pipeline: {}\nInput: {}\nOutput: {}\nQuality Preset: {}\nStages: {}\nErrors: {}\nWarnings: {}",
            self.diagnostics.pipeline_id,
            self.diagnostics.input_file,
            self.diagnostics.output_file,
            self.diagnostics.quality_preset,
            self.diagnostics.stage_timings.len(),
            self.diagnostics.errors.len(),
            self.diagnostics.warnings.len(),
        )
    }
}
