use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::storage::SharedStorage;
use crate::vocabulary::{VocabularyMatch, search_vocabulary};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Portuguese or English text to look for
    pub term: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/vocabulary/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matches, exact ones first", body = Vec<VocabularyMatch>),
        (status = 400, description = "Search term is required", body = ErrorBody)
    )
)]
pub async fn search(
    State(storage): State<SharedStorage>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, ApiError>,
) -> ApiResult<Json<Vec<VocabularyMatch>>> {
    let term = query
        .term
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Search term is required".to_string()))?;
    let results = search_vocabulary(storage.as_ref(), &term)
        .await
        .map_err(ApiError::internal("Failed to search vocabulary"))?;
    Ok(Json(results))
}

pub fn get_vocabulary_scope() -> Router<SharedStorage> {
    Router::new().route("/vocabulary/search", get(search))
}
