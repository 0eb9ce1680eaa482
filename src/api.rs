pub mod auth;
pub mod conversations;
pub mod lessons;
pub mod public;
pub mod users;
pub mod vocabulary;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::{ApiError, ApiResult};
use crate::models::{Lesson, User};
use crate::storage::{SharedStorage, Storage};

/// Session key holding the logged-in user's id.
pub const SESSION_USER_ID: &str = "user_id";

#[derive(OpenApi)]
#[openapi(
    paths(
        lessons::list_lessons,
        lessons::get_lesson,
        lessons::update_lesson_status,
        lessons::get_lesson_vocabulary,
        lessons::get_lesson_quiz,
        lessons::grade_quiz,
        lessons::submit_progress,
        lessons::get_lesson_conversations,
        vocabulary::search,
        users::get_user,
        users::get_user_progress,
        users::get_user_lesson_progress,
        users::get_user_statistics,
        users::get_user_certificate,
        users::get_user_conversation_practice,
        users::get_user_scenario_practice,
        conversations::list_scenarios,
        conversations::get_scenario,
        conversations::get_dialogues,
        conversations::submit_practice,
        conversations::check_response,
        auth::register,
        auth::login,
        auth::logout,
        auth::current_user,
        public::health,
        public::get_audio,
    ),
    info(title = "Portuguese tutor", version = "0.1.0")
)]
pub struct ApiDoc;

pub fn openapi_json() -> anyhow::Result<String> {
    Ok(ApiDoc::openapi().to_pretty_json()?)
}

/// Every `/api` route plus Swagger UI.
pub fn build_router<S>(storage: SharedStorage, sessions: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    let api = Router::new()
        .merge(lessons::get_lesson_scope())
        .merge(vocabulary::get_vocabulary_scope())
        .merge(users::get_user_scope())
        .merge(conversations::get_conversation_scope())
        .merge(auth::get_auth_scope())
        .merge(public::get_public_scope())
        .layer(sessions)
        .with_state(storage);
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Parse a numeric path segment, naming the entity in the error.
pub(crate) fn parse_id(raw: &str, entity: &str) -> ApiResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {entity} ID")))
}

pub(crate) async fn require_lesson(storage: &dyn Storage, id: i64) -> ApiResult<Lesson> {
    storage
        .get_lesson(id)
        .await
        .map_err(ApiError::internal("Failed to fetch lesson"))?
        .ok_or_else(|| ApiError::NotFound("Lesson not found".to_string()))
}

pub(crate) async fn require_user(storage: &dyn Storage, id: i64) -> ApiResult<User> {
    storage
        .get_user(id)
        .await
        .map_err(ApiError::internal("Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("12", "lesson").unwrap(), 12);
        let err = parse_id("abc", "lesson").unwrap_err();
        assert_eq!(err.to_string(), "Invalid lesson ID");
        assert!(parse_id("", "user").is_err());
    }

    #[test]
    fn openapi_lists_routes() {
        let json = openapi_json().unwrap();
        assert!(json.contains("/api/lessons/{id}/progress"));
        assert!(json.contains("/api/conversation-scenarios/{id}/dialogues"));
        assert!(json.contains("/api/users/{id}/certificate"));
    }
}
