use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::{parse_id, require_user};
use crate::certificate::{Certificate, issue_certificate};
use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::models::{User, UserConversationPractice, UserProgress};
use crate::storage::SharedStorage;
use crate::utils::{now_utc, percentage};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserWithProgress {
    #[serde(flatten)]
    pub user: User,
    pub progress_percentage: i64,
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user and overall progress", body = UserWithProgress),
        (status = 400, description = "Invalid user ID", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserWithProgress>> {
    let id = parse_id(&id, "user")?;
    let user = require_user(storage.as_ref(), id).await?;
    let progress_percentage = storage
        .calculate_user_progress_percentage(id)
        .await
        .map_err(ApiError::internal("Failed to calculate progress"))?;
    Ok(Json(UserWithProgress {
        user,
        progress_percentage,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/progress",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Progress rows of the user", body = Vec<UserProgress>),
        (status = 400, description = "Invalid user ID", body = ErrorBody)
    )
)]
pub async fn get_user_progress(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<UserProgress>>> {
    let id = parse_id(&id, "user")?;
    let progress = storage
        .get_user_progress_by_user_id(id)
        .await
        .map_err(ApiError::internal("Failed to fetch user progress"))?;
    Ok(Json(progress))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/lessons/{lesson_id}/progress",
    params(
        ("id" = i64, Path, description = "User id"),
        ("lesson_id" = i64, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Progress on one lesson", body = UserProgress),
        (status = 400, description = "Invalid user or lesson ID", body = ErrorBody),
        (status = 404, description = "Progress not found", body = ErrorBody)
    )
)]
pub async fn get_user_lesson_progress(
    State(storage): State<SharedStorage>,
    Path((user_id, lesson_id)): Path<(String, String)>,
) -> ApiResult<Json<UserProgress>> {
    let user_id = parse_id(&user_id, "user")?;
    let lesson_id = parse_id(&lesson_id, "lesson")?;
    let progress = storage
        .get_user_progress_by_lesson_id(user_id, lesson_id)
        .await
        .map_err(ApiError::internal("Failed to fetch user progress"))?
        .ok_or_else(|| ApiError::NotFound("Progress not found".to_string()))?;
    Ok(Json(progress))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub progress_percentage: i64,
    /// Rounded mean score over completed lessons
    pub average_score: i64,
    /// Words introduced by the completed lessons
    pub vocabulary_count: i64,
    pub level: i64,
    pub xp: i64,
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/statistics",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Learning statistics", body = UserStatistics),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn get_user_statistics(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserStatistics>> {
    let id = parse_id(&id, "user")?;
    let user = require_user(storage.as_ref(), id).await?;
    let lessons = storage
        .get_lessons()
        .await
        .map_err(ApiError::internal("Failed to fetch lessons"))?;
    let completed: Vec<UserProgress> = storage
        .get_user_progress_by_user_id(id)
        .await
        .map_err(ApiError::internal("Failed to fetch user progress"))?
        .into_iter()
        .filter(|p| p.completed)
        .collect();

    let score_sum: i64 = completed.iter().filter_map(|p| p.score).sum();
    let average_score = match completed.len() {
        0 => 0,
        n => (score_sum as f64 / n as f64).round() as i64,
    };
    let vocabulary_count = lessons
        .iter()
        .filter(|l| completed.iter().any(|p| p.lesson_id == l.id))
        .map(|l| l.word_count)
        .sum();

    Ok(Json(UserStatistics {
        completed_lessons: completed.len(),
        total_lessons: lessons.len(),
        progress_percentage: percentage(completed.len(), lessons.len()),
        average_score,
        vocabulary_count,
        level: user.level,
        xp: user.xp,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/certificate",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Certificate for the current progress", body = Certificate),
        (status = 404, description = "User not found or not eligible yet", body = ErrorBody)
    )
)]
pub async fn get_user_certificate(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Certificate>> {
    let id = parse_id(&id, "user")?;
    let user = require_user(storage.as_ref(), id).await?;
    let total = storage
        .get_lessons()
        .await
        .map_err(ApiError::internal("Failed to fetch lessons"))?
        .len();
    let completed = storage
        .get_user_progress_by_user_id(id)
        .await
        .map_err(ApiError::internal("Failed to fetch user progress"))?
        .iter()
        .filter(|p| p.completed)
        .count();
    let certificate = issue_certificate(&user, completed, total, now_utc().date())
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(Json(certificate))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/conversation-practice",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Practice rows of the user", body = Vec<UserConversationPractice>),
        (status = 400, description = "Invalid user ID", body = ErrorBody)
    )
)]
pub async fn get_user_conversation_practice(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<UserConversationPractice>>> {
    let id = parse_id(&id, "user")?;
    let practice = storage
        .get_user_conversation_practice_by_user_id(id)
        .await
        .map_err(ApiError::internal("Failed to fetch conversation practice"))?;
    Ok(Json(practice))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/conversations/{scenario_id}/practice",
    params(
        ("id" = i64, Path, description = "User id"),
        ("scenario_id" = i64, Path, description = "Conversation scenario id")
    ),
    responses(
        (status = 200, description = "Practice on one scenario", body = UserConversationPractice),
        (status = 400, description = "Invalid user or scenario ID", body = ErrorBody),
        (status = 404, description = "Conversation practice not found", body = ErrorBody)
    )
)]
pub async fn get_user_scenario_practice(
    State(storage): State<SharedStorage>,
    Path((user_id, scenario_id)): Path<(String, String)>,
) -> ApiResult<Json<UserConversationPractice>> {
    let user_id = parse_id(&user_id, "user")?;
    let scenario_id = parse_id(&scenario_id, "scenario")?;
    let practice = storage
        .get_user_conversation_practice_by_scenario_id(user_id, scenario_id)
        .await
        .map_err(ApiError::internal("Failed to fetch conversation practice"))?
        .ok_or_else(|| ApiError::NotFound("Conversation practice not found".to_string()))?;
    Ok(Json(practice))
}

pub fn get_user_scope() -> Router<SharedStorage> {
    Router::new()
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/progress", get(get_user_progress))
        .route(
            "/users/{id}/lessons/{lesson_id}/progress",
            get(get_user_lesson_progress),
        )
        .route("/users/{id}/statistics", get(get_user_statistics))
        .route("/users/{id}/certificate", get(get_user_certificate))
        .route(
            "/users/{id}/conversation-practice",
            get(get_user_conversation_practice),
        )
        .route(
            "/users/{id}/conversations/{scenario_id}/practice",
            get(get_user_scenario_practice),
        )
}
