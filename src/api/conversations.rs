use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use super::{parse_id, require_user};
use crate::conversation::{TurnFeedback, response_matches};
use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::models::{
    Completion, ConversationDialogue, ConversationScenario, SpeakerRole, UserConversationPractice,
};
use crate::storage::{SharedStorage, Storage};

async fn require_scenario(storage: &dyn Storage, id: i64) -> ApiResult<ConversationScenario> {
    storage
        .get_conversation_scenario(id)
        .await
        .map_err(ApiError::internal("Failed to fetch conversation scenario"))?
        .ok_or_else(|| ApiError::NotFound("Conversation scenario not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/conversation-scenarios",
    responses(
        (status = 200, description = "All scenarios in lesson order", body = Vec<ConversationScenario>),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_scenarios(
    State(storage): State<SharedStorage>,
) -> ApiResult<Json<Vec<ConversationScenario>>> {
    let scenarios = storage
        .get_conversation_scenarios()
        .await
        .map_err(ApiError::internal("Failed to fetch conversation scenarios"))?;
    Ok(Json(scenarios))
}

#[utoipa::path(
    get,
    path = "/api/conversation-scenarios/{id}",
    params(("id" = i64, Path, description = "Conversation scenario id")),
    responses(
        (status = 200, description = "The scenario", body = ConversationScenario),
        (status = 400, description = "Invalid scenario ID", body = ErrorBody),
        (status = 404, description = "Conversation scenario not found", body = ErrorBody)
    )
)]
pub async fn get_scenario(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConversationScenario>> {
    let id = parse_id(&id, "scenario")?;
    Ok(Json(require_scenario(storage.as_ref(), id).await?))
}

#[utoipa::path(
    get,
    path = "/api/conversation-scenarios/{id}/dialogues",
    params(("id" = i64, Path, description = "Conversation scenario id")),
    responses(
        (status = 200, description = "Turns of the scenario in order", body = Vec<ConversationDialogue>),
        (status = 400, description = "Invalid scenario ID", body = ErrorBody)
    )
)]
pub async fn get_dialogues(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ConversationDialogue>>> {
    let id = parse_id(&id, "scenario")?;
    let dialogues = storage
        .get_conversation_dialogues_by_scenario_id(id)
        .await
        .map_err(ApiError::internal("Failed to fetch conversation dialogues"))?;
    Ok(Json(dialogues))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSubmission {
    pub user_id: i64,
    /// Percentage of learner turns answered correctly, 0 to 100
    pub accuracy: i64,
}

#[utoipa::path(
    post,
    path = "/api/conversation-scenarios/{id}/practice",
    params(("id" = i64, Path, description = "Conversation scenario id")),
    request_body = PracticeSubmission,
    responses(
        (status = 200, description = "Stored practice result", body = UserConversationPractice),
        (status = 400, description = "Invalid data provided", body = ErrorBody),
        (status = 404, description = "Scenario or user not found", body = ErrorBody)
    )
)]
pub async fn submit_practice(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<PracticeSubmission>, ApiError>,
) -> ApiResult<Json<UserConversationPractice>> {
    let scenario_id = parse_id(&id, "scenario")?;
    if !(0..=100).contains(&req.accuracy) {
        return Err(ApiError::Validation(json!([{
            "path": ["accuracy"],
            "message": "Number must be between 0 and 100",
        }])));
    }
    require_scenario(storage.as_ref(), scenario_id).await?;
    require_user(storage.as_ref(), req.user_id).await?;
    let practice = storage
        .upsert_user_conversation_practice(Completion::now(req.user_id, scenario_id, req.accuracy))
        .await
        .map_err(ApiError::internal("Failed to save conversation practice"))?;
    info!(
        "user {} practiced scenario {} with accuracy {}",
        req.user_id, scenario_id, req.accuracy
    );
    Ok(Json(practice))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResponseCheck {
    pub response: String,
}

#[utoipa::path(
    post,
    path = "/api/conversation-scenarios/{id}/dialogues/{dialogue_id}/check",
    params(
        ("id" = i64, Path, description = "Conversation scenario id"),
        ("dialogue_id" = i64, Path, description = "Dialogue turn id")
    ),
    request_body = ResponseCheck,
    responses(
        (status = 200, description = "Whether the response is accepted", body = TurnFeedback),
        (status = 400, description = "Invalid ID or not a learner turn", body = ErrorBody),
        (status = 404, description = "Scenario or dialogue not found", body = ErrorBody)
    )
)]
pub async fn check_response(
    State(storage): State<SharedStorage>,
    Path((id, dialogue_id)): Path<(String, String)>,
    WithRejection(Json(req), _): WithRejection<Json<ResponseCheck>, ApiError>,
) -> ApiResult<Json<TurnFeedback>> {
    let scenario_id = parse_id(&id, "scenario")?;
    let dialogue_id = parse_id(&dialogue_id, "dialogue")?;
    require_scenario(storage.as_ref(), scenario_id).await?;
    let dialogue = storage
        .get_conversation_dialogues_by_scenario_id(scenario_id)
        .await
        .map_err(ApiError::internal("Failed to fetch conversation dialogues"))?
        .into_iter()
        .find(|d| d.id == dialogue_id)
        .ok_or_else(|| ApiError::NotFound("Dialogue not found".to_string()))?;
    if dialogue.speaker_role != SpeakerRole::User {
        return Err(ApiError::BadRequest(
            "Dialogue is not a learner turn".to_string(),
        ));
    }
    Ok(Json(TurnFeedback {
        correct: response_matches(&req.response, &dialogue.accepted_responses),
        expected: dialogue.portuguese,
        hints: dialogue.hints,
    }))
}

pub fn get_conversation_scope() -> Router<SharedStorage> {
    Router::new()
        .route("/conversation-scenarios", get(list_scenarios))
        .route("/conversation-scenarios/{id}", get(get_scenario))
        .route("/conversation-scenarios/{id}/dialogues", get(get_dialogues))
        .route("/conversation-scenarios/{id}/practice", post(submit_practice))
        .route(
            "/conversation-scenarios/{id}/dialogues/{dialogue_id}/check",
            post(check_response),
        )
        // older clients
        .route("/conversations/{id}", get(get_scenario))
        .route("/conversations/{id}/dialogues", get(get_dialogues))
        .route("/conversations/{id}/practice", post(submit_practice))
}
