use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use super::{parse_id, require_lesson, require_user};
use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::models::{
    Completion, ConversationScenario, Lesson, LessonStatus, UserProgress, Vocabulary,
};
use crate::quiz::{AnswerFeedback, QuestionWithOptions, QuizSession};
use crate::storage::{SharedStorage, Storage};

/// xp awarded per correct quiz answer
pub const XP_PER_POINT: i64 = 10;

/// Highest score a progress submission may carry.
pub const MAX_SCORE: i64 = 1000;

#[utoipa::path(
    get,
    path = "/api/lessons",
    responses(
        (status = 200, description = "All lessons in curriculum order", body = Vec<Lesson>),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_lessons(State(storage): State<SharedStorage>) -> ApiResult<Json<Vec<Lesson>>> {
    let lessons = storage
        .get_lessons()
        .await
        .map_err(ApiError::internal("Failed to fetch lessons"))?;
    Ok(Json(lessons))
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "The lesson", body = Lesson),
        (status = 400, description = "Invalid lesson ID", body = ErrorBody),
        (status = 404, description = "Lesson not found", body = ErrorBody)
    )
)]
pub async fn get_lesson(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Lesson>> {
    let id = parse_id(&id, "lesson")?;
    Ok(Json(require_lesson(storage.as_ref(), id).await?))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub status: String,
}

#[utoipa::path(
    patch,
    path = "/api/lessons/{id}/status",
    params(("id" = i64, Path, description = "Lesson id")),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Updated lesson", body = Lesson),
        (status = 400, description = "Invalid lesson ID or status", body = ErrorBody),
        (status = 404, description = "Lesson not found", body = ErrorBody)
    )
)]
pub async fn update_lesson_status(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<StatusUpdate>, ApiError>,
) -> ApiResult<Json<Lesson>> {
    let id = parse_id(&id, "lesson")?;
    let status: LessonStatus = req
        .status
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid status".to_string()))?;
    let lesson = storage
        .update_lesson_status(id, status)
        .await
        .map_err(ApiError::internal("Failed to update lesson status"))?
        .ok_or_else(|| ApiError::NotFound("Lesson not found".to_string()))?;
    Ok(Json(lesson))
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}/vocabulary",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Vocabulary of the lesson", body = Vec<Vocabulary>),
        (status = 400, description = "Invalid lesson ID", body = ErrorBody)
    )
)]
pub async fn get_lesson_vocabulary(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Vocabulary>>> {
    let id = parse_id(&id, "lesson")?;
    let words = storage
        .get_vocabulary_by_lesson_id(id)
        .await
        .map_err(ApiError::internal("Failed to fetch vocabulary"))?;
    Ok(Json(words))
}

async fn questions_with_options(
    storage: &dyn Storage,
    lesson_id: i64,
) -> anyhow::Result<Vec<QuestionWithOptions>> {
    let questions = storage.get_quiz_questions_by_lesson_id(lesson_id).await?;
    let mut result = Vec::with_capacity(questions.len());
    for question in questions {
        let options = storage.get_quiz_options_by_question_id(question.id).await?;
        result.push(QuestionWithOptions {
            question,
            options: options.into_iter().map(Into::into).collect(),
        });
    }
    Ok(result)
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}/quiz",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Questions with their options", body = Vec<QuestionWithOptions>),
        (status = 400, description = "Invalid lesson ID", body = ErrorBody)
    )
)]
pub async fn get_lesson_quiz(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<QuestionWithOptions>>> {
    let id = parse_id(&id, "lesson")?;
    let quiz = questions_with_options(storage.as_ref(), id)
        .await
        .map_err(ApiError::internal("Failed to fetch quiz questions"))?;
    Ok(Json(quiz))
}

/// Mark a lesson completed for a user and award xp for the score.
pub(crate) async fn record_lesson_completion(
    storage: &dyn Storage,
    lesson_id: i64,
    user_id: i64,
    score: i64,
) -> ApiResult<UserProgress> {
    require_lesson(storage, lesson_id).await?;
    require_user(storage, user_id).await?;
    validate_score(score)?;
    let progress = storage
        .complete_lesson(Completion::now(user_id, lesson_id, score), score * XP_PER_POINT)
        .await
        .map_err(ApiError::internal("Failed to save progress"))?;
    info!(
        "user {} completed lesson {} with score {}",
        user_id, lesson_id, score
    );
    Ok(progress)
}

fn validate_score(score: i64) -> ApiResult<()> {
    let message = if score < 0 {
        "Number must be greater than or equal to 0".to_string()
    } else if score > MAX_SCORE {
        format!("Number must be less than or equal to {MAX_SCORE}")
    } else {
        return Ok(());
    };
    Err(ApiError::Validation(json!([{ "path": ["score"], "message": message }])))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSubmission {
    pub user_id: i64,
    pub score: i64,
}

#[utoipa::path(
    post,
    path = "/api/lessons/{id}/progress",
    params(("id" = i64, Path, description = "Lesson id")),
    request_body = ProgressSubmission,
    responses(
        (status = 200, description = "Stored progress", body = UserProgress),
        (status = 400, description = "Invalid data provided", body = ErrorBody),
        (status = 404, description = "Lesson or user not found", body = ErrorBody)
    )
)]
pub async fn submit_progress(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<ProgressSubmission>, ApiError>,
) -> ApiResult<Json<UserProgress>> {
    let lesson_id = parse_id(&id, "lesson")?;
    validate_score(req.score)?;
    let progress =
        record_lesson_completion(storage.as_ref(), lesson_id, req.user_id, req.score).await?;
    Ok(Json(progress))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    pub question_id: i64,
    pub answer: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    pub user_id: i64,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GradedQuiz {
    pub score: i64,
    pub total: i64,
    pub results: Vec<AnswerFeedback>,
    pub progress: UserProgress,
}

#[utoipa::path(
    post,
    path = "/api/lessons/{id}/quiz/grade",
    params(("id" = i64, Path, description = "Lesson id")),
    request_body = QuizSubmission,
    responses(
        (status = 200, description = "Graded quiz and stored progress", body = GradedQuiz),
        (status = 400, description = "Answers missing or the lesson has no quiz", body = ErrorBody),
        (status = 404, description = "Lesson or user not found", body = ErrorBody)
    )
)]
pub async fn grade_quiz(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<QuizSubmission>, ApiError>,
) -> ApiResult<Json<GradedQuiz>> {
    let lesson_id = parse_id(&id, "lesson")?;
    require_lesson(storage.as_ref(), lesson_id).await?;
    let questions = storage
        .get_quiz_questions_by_lesson_id(lesson_id)
        .await
        .map_err(ApiError::internal("Failed to fetch quiz questions"))?;
    let mut quiz =
        QuizSession::new(questions).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut results = Vec::with_capacity(quiz.total());
    loop {
        let Some(question) = quiz.current_question() else {
            break;
        };
        let question_id = question.id;
        let Some(answer) = req.answers.iter().find(|a| a.question_id == question_id) else {
            return Err(ApiError::BadRequest(format!(
                "Missing answer for question {question_id}"
            )));
        };
        results.push(
            quiz.answer(&answer.answer)
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        );
        if quiz.is_finished() {
            break;
        }
        quiz.next().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }
    let result = quiz
        .finish()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let progress =
        record_lesson_completion(storage.as_ref(), lesson_id, req.user_id, result.score).await?;
    Ok(Json(GradedQuiz {
        score: result.score,
        total: result.total,
        results,
        progress,
    }))
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}/conversations",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Conversation scenarios of the lesson", body = Vec<ConversationScenario>),
        (status = 400, description = "Invalid lesson ID", body = ErrorBody)
    )
)]
pub async fn get_lesson_conversations(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ConversationScenario>>> {
    let id = parse_id(&id, "lesson")?;
    let scenarios = storage
        .get_conversation_scenarios_by_lesson_id(id)
        .await
        .map_err(ApiError::internal("Failed to fetch conversation scenarios"))?;
    Ok(Json(scenarios))
}

pub fn get_lesson_scope() -> Router<SharedStorage> {
    Router::new()
        .route("/lessons", get(list_lessons))
        .route("/lessons/{id}", get(get_lesson))
        .route("/lessons/{id}/status", patch(update_lesson_status))
        .route("/lessons/{id}/vocabulary", get(get_lesson_vocabulary))
        .route("/lessons/{id}/quiz", get(get_lesson_quiz))
        .route("/lessons/{id}/quiz/grade", post(grade_quiz))
        .route("/lessons/{id}/progress", post(submit_progress))
        .route("/lessons/{id}/conversations", get(get_lesson_conversations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bounds() {
        assert!(validate_score(0).is_ok());
        assert!(validate_score(MAX_SCORE).is_ok());
        for bad in [-1, MAX_SCORE + 1, i64::MAX, i64::MIN] {
            let Err(ApiError::Validation(details)) = validate_score(bad) else {
                panic!("score {bad} should be rejected");
            };
            assert_eq!(details[0]["path"][0], "score");
        }
        // the largest accepted score still fits once scaled to xp
        assert!(MAX_SCORE.checked_mul(XP_PER_POINT).is_some());
    }
}
