use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Json, Multipart, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use viton_core::{cuda_available, device_label, list_checkpoints, try_on};

use crate::{error::ApiError, state::AppState};

pub const PERSON_FIELD: &str = "person_image";
pub const CLOTHING_FIELD: &str = "clothing_image";

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub device: String,
    pub cuda_available: bool,
    pub model_loaded: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct TryOnResponse {
    pub success: bool,
    pub result_image: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ModelsResponse {
    pub available_models: Vec<String>,
    pub selected_model: String,
}

struct Upload {
    file_name: String,
    bytes: Bytes,
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/tryon", post(tryon_handler))
        .route("/api/models", get(models_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        device: device_label(state.model.device()).to_string(),
        cuda_available: cuda_available(),
        model_loaded: state.model.is_loaded(),
    })
}

async fn tryon_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TryOnResponse>, ApiError> {
    // A body that isn't multipart carries no files at all.
    let multipart = multipart.map_err(|_| ApiError::MissingFiles)?;
    let (person, clothing) = read_uploads(multipart).await?;
    tracing::info!(
        person = %person.file_name,
        person_bytes = person.bytes.len(),
        clothing = %clothing.file_name,
        clothing_bytes = clothing.bytes.len(),
        "Processing try-on request"
    );

    let model = state.model.get_or_load().await.map_err(ApiError::TryOn)?;
    let resolution = state.resolution;
    let output = tokio::task::spawn_blocking(move || {
        try_on(model.as_ref(), &person.bytes, &clothing.bytes, resolution)
    })
    .await
    .map_err(|e| ApiError::TryOn(e.into()))?
    .map_err(|e| ApiError::TryOn(e.into()))?;

    Ok(Json(TryOnResponse {
        success: true,
        result_image: output.data_url,
        message: "Try-on generated successfully".to_string(),
    }))
}

async fn read_uploads(mut multipart: Multipart) -> Result<(Upload, Upload), ApiError> {
    let mut person = None;
    let mut clothing = None;

    while let Some(field) = multipart.next_field().await? {
        let slot = match field.name() {
            Some(PERSON_FIELD) => &mut person,
            Some(CLOTHING_FIELD) => &mut clothing,
            _ => continue,
        };
        // Only parts carrying a filename are files; the first one per name wins.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if slot.is_some() {
            continue;
        }
        let bytes = field.bytes().await?;
        *slot = Some(Upload { file_name, bytes });
    }

    match (person, clothing) {
        (Some(person), Some(clothing)) => Ok((person, clothing)),
        _ => Err(ApiError::MissingFiles),
    }
}

async fn models_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ModelsResponse>, ApiError> {
    let available_models =
        list_checkpoints(state.model.checkpoint_dir()).map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(ModelsResponse {
        available_models,
        selected_model: state.model.checkpoint().to_string(),
    }))
}
