use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::SharedStorage;

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    pub status: String,
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Server is up", body = Health))
)]
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

/// Pronunciation audio is synthesized on the client, so every file is empty.
#[utoipa::path(
    get,
    path = "/api/audio/{file_name}",
    params(("file_name" = String, Path, description = "Audio file name")),
    responses((status = 204, description = "No audio content"))
)]
pub async fn get_audio(Path(_file_name): Path<String>) -> StatusCode {
    StatusCode::NO_CONTENT
}

pub fn get_public_scope() -> Router<SharedStorage> {
    Router::new()
        .route("/health", get(health))
        .route("/audio/{file_name}", get(get_audio))
}
