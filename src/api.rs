//! HTTP surface for profile management and conversion.
//!
//! The DSP is synchronous and CPU-bound; every handler hands the actual
//! work to `spawn_blocking` so one conversion never stalls the runtime.
//! Status mapping: missing profile 404, unknown preset or unreadable audio
//! 400, quality-gate rejection 422, everything else 500.

use std::io::Write;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::audio_io::load_audio;
use crate::config::{ConversionQuality, QualitySettings};
use crate::converter::{ConversionRequest, VoiceConverter};
use crate::error::{AnalysisError, VoicoError};
use crate::profile::VoiceProfileBuilder;
use crate::store::ProfileStore;

/// Uploads beyond this size are rejected up front.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub struct ApiState {
    store: ProfileStore,
}

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unprocessable(String),
    Internal(String),
}

impl From<VoicoError> for ApiError {
    fn from(err: VoicoError) -> Self {
        match &err {
            VoicoError::Analysis(AnalysisError::ProfileQualityInsufficient { .. }) => {
                ApiError::Unprocessable(err.to_string())
            }
            VoicoError::AudioLoad { .. } | VoicoError::UnsupportedFormat { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<crate::store::StoreError> for ApiError {
    fn from(err: crate::store::StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(d) => (StatusCode::NOT_FOUND, d),
            ApiError::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            ApiError::Unprocessable(d) => (StatusCode::UNPROCESSABLE_ENTITY, d),
            ApiError::Internal(d) => (StatusCode::INTERNAL_SERVER_ERROR, d),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

fn internal(message: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(message.to_string())
}

pub fn create_router(store: ProfileStore) -> Router {
    let state = Arc::new(ApiState { store });
    Router::new()
        .route("/health", get(health))
        .route("/profiles", get(list_profiles))
        .route(
            "/profiles/:name",
            get(get_profile).delete(delete_profile),
        )
        .route("/profiles/:name/analyze", axum::routing::post(analyze_profile))
        .route("/convert", axum::routing::post(convert))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Bind and serve until the task is cancelled.
pub async fn serve(addr: &str, store: ProfileStore) -> Result<(), std::io::Error> {
    let app = create_router(store);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("voico API listening on {addr}");
    axum::serve(listener, app).await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_profiles(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let listed = state.store.list()?;
    Ok(Json(serde_json::to_value(listed).map_err(internal)?))
}

async fn get_profile(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let profile = state
        .store
        .load(&name)?
        .ok_or_else(|| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    Ok(Json(json!({
        "name": name,
        "sample_rate": profile.sample_rate,
        "f0_mean": profile.pitch.f0_mean,
        "f0_std": profile.pitch.f0_std,
        "hnr": profile.pitch.hnr_db,
        "mean_formants": profile.formants.mean_frequencies,
        "spectral_tilt": profile.spectral.spectral_tilt,
    })))
}

async fn delete_profile(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.store.delete(&name)? {
        return Err(ApiError::NotFound(format!("Profile '{name}' not found")));
    }
    Ok(Json(json!({ "deleted": name })))
}

async fn analyze_profile(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let upload = read_upload(multipart).await?;
    let quality: ConversionQuality = upload
        .quality
        .parse()
        .map_err(|e: VoicoError| ApiError::BadRequest(e.to_string()))?;

    let input = write_temp_wav(&upload.audio)?;
    let profile = tokio::task::spawn_blocking(move || -> Result<_, VoicoError> {
        let (samples, sample_rate) = load_audio(input.path())?;
        let settings = QualitySettings::from_preset(quality);
        let builder = VoiceProfileBuilder::from_settings(sample_rate, &settings);
        Ok(builder.build(&samples, "upload"))
    })
    .await
    .map_err(internal)??;

    state.store.save(&name, &profile)?;
    Ok(Json(json!({
        "name": name,
        "sample_rate": profile.sample_rate,
        "f0_mean": profile.pitch.f0_mean,
        "saved": true,
    })))
}

async fn convert(
    State(_state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;
    let quality: ConversionQuality = upload
        .quality
        .parse()
        .map_err(|e: VoicoError| ApiError::BadRequest(e.to_string()))?;

    let input = write_temp_wav(&upload.audio)?;
    let output = tempfile::Builder::new()
        .suffix(".wav")
        .tempfile()
        .map_err(internal)?;

    let request = ConversionRequest {
        input_path: input.path().to_path_buf(),
        output_path: output.path().to_path_buf(),
        pitch_shift: upload.pitch_shift,
        formant_shift: upload.formant_shift,
        target_path: None,
        bit_depth: upload.bit_depth,
    };

    tokio::task::spawn_blocking(move || -> Result<_, VoicoError> {
        let mut converter = VoiceConverter::new(quality);
        converter.process(&request)
    })
    .await
    .map_err(internal)??;

    let bytes = tokio::fs::read(output.path()).await.map_err(internal)?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"converted.wav\"".to_string(),
            ),
        ],
        bytes,
    )
        .into_response())
}

struct Upload {
    audio: Vec<u8>,
    quality: String,
    pitch_shift: f32,
    formant_shift: f32,
    bit_depth: u16,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload {
        audio: Vec::new(),
        quality: "balanced".to_string(),
        pitch_shift: 0.0,
        formant_shift: 1.0,
        bit_depth: 16,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                upload.audio = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?
                    .to_vec();
            }
            "quality" => {
                upload.quality = read_text_field(field).await?;
            }
            "pitch_shift" => {
                upload.pitch_shift = parse_field(field, "pitch_shift").await?;
            }
            "formant_shift" => {
                upload.formant_shift = parse_field(field, "formant_shift").await?;
            }
            "bit_depth" => {
                upload.bit_depth = parse_field(field, "bit_depth").await?;
            }
            _ => {}
        }
    }

    if upload.audio.is_empty() {
        return Err(ApiError::BadRequest("missing 'file' field".to_string()));
    }
    Ok(upload)
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid form field: {e}")))
}

async fn parse_field<T: std::str::FromStr>(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<T, ApiError> {
    read_text_field(field)
        .await?
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid value for '{name}'")))
}

fn write_temp_wav(bytes: &[u8]) -> Result<tempfile::NamedTempFile, ApiError> {
    let mut file = tempfile::Builder::new()
        .suffix(".wav")
        .tempfile()
        .map_err(internal)?;
    file.write_all(bytes).map_err(internal)?;
    file.flush().map_err(internal)?;
    Ok(file)
}
