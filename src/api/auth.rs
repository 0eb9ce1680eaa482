use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::info;
use utoipa::ToSchema;

use super::SESSION_USER_ID;
use crate::auth::{self, MIN_PASSWORD_LEN};
use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::models::{NewUser, User};
use crate::storage::{DuplicateUsername, SharedStorage};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

impl RegisterRequest {
    fn validate(&self) -> ApiResult<()> {
        let mut issues = Vec::new();
        if self.username.trim().is_empty() {
            issues.push(json!({"path": ["username"], "message": "Username is required"}));
        }
        if self.display_name.trim().is_empty() {
            issues.push(json!({"path": ["displayName"], "message": "Display name is required"}));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            issues.push(json!({
                "path": ["password"],
                "message": format!("Password must contain at least {MIN_PASSWORD_LEN} characters"),
            }));
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(issues.into()))
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    pub message: String,
}

/// A concurrent registration can still win the username after the lookup.
fn registration_error(e: anyhow::Error) -> ApiError {
    if e.downcast_ref::<DuplicateUsername>().is_some() {
        ApiError::Conflict("Username already exists".to_string())
    } else {
        ApiError::Internal {
            message: "Failed to register user",
            source: e,
        }
    }
}

async fn remember_user(session: &Session, user: &User) -> ApiResult<()> {
    session
        .insert(SESSION_USER_ID, user.id)
        .await
        .map_err(|e| ApiError::Internal {
            message: "Failed to store session",
            source: e.into(),
        })
}

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered and logged in", body = User),
        (status = 400, description = "Invalid data provided", body = ErrorBody),
        (status = 409, description = "Username already exists", body = ErrorBody)
    )
)]
pub async fn register(
    State(storage): State<SharedStorage>,
    session: Session,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> ApiResult<Json<User>> {
    req.validate()?;
    let taken = storage
        .get_user_by_username(req.username.trim())
        .await
        .map_err(ApiError::internal("Failed to register user"))?;
    if taken.is_some() {
        return Err(ApiError::Conflict("Username already exists".to_string()));
    }
    let user = auth::register(
        storage.as_ref(),
        NewUser {
            username: req.username.trim().to_string(),
            password: req.password,
            display_name: req.display_name.trim().to_string(),
        },
    )
    .await
    .map_err(registration_error)?;
    remember_user(&session, &user).await?;
    info!("registered user {} ({})", user.username, user.id);
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = User),
        (status = 401, description = "Invalid username or password", body = ErrorBody)
    )
)]
pub async fn login(
    State(storage): State<SharedStorage>,
    session: Session,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<Json<User>> {
    let user = auth::login(storage.as_ref(), req.username.trim(), &req.password)
        .await
        .map_err(ApiError::internal("Failed to log in"))?
        .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".to_string()))?;
    session.cycle_id().await.map_err(|e| ApiError::Internal {
        message: "Failed to store session",
        source: e.into(),
    })?;
    remember_user(&session, &user).await?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses((status = 200, description = "Logged out", body = Message))
)]
pub async fn logout(session: Session) -> ApiResult<Json<Message>> {
    session.delete().await.map_err(|e| ApiError::Internal {
        message: "Failed to log out",
        source: e.into(),
    })?;
    Ok(Json(Message {
        message: "Logged out".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/user",
    responses(
        (status = 200, description = "The logged-in user", body = User),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn current_user(
    State(storage): State<SharedStorage>,
    session: Session,
) -> ApiResult<Json<User>> {
    let unauthorized = || ApiError::Unauthorized("Not authenticated".to_string());
    let user_id: i64 = session
        .get(SESSION_USER_ID)
        .await
        .map_err(|e| ApiError::Internal {
            message: "Failed to read session",
            source: e.into(),
        })?
        .ok_or_else(unauthorized)?;
    let user = storage
        .get_user(user_id)
        .await
        .map_err(ApiError::internal("Failed to fetch user"))?
        .ok_or_else(unauthorized)?;
    Ok(Json(user))
}

pub fn get_auth_scope() -> Router<SharedStorage> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(current_user))
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::*;

    #[test]
    fn registration_validation() {
        let ok = RegisterRequest {
            username: "ana".into(),
            password: "segredo".into(),
            display_name: "Ana".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterRequest {
            username: " ".into(),
            password: "123".into(),
            display_name: "Ana".into(),
        };
        let Err(ApiError::Validation(details)) = bad.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(details.as_array().unwrap().len(), 2);
    }

    #[test]
    fn duplicate_username_maps_to_conflict() {
        let taken = registration_error(DuplicateUsername("ana".into()).into());
        assert!(matches!(taken, ApiError::Conflict(_)));
        assert_eq!(taken.into_response().status(), StatusCode::CONFLICT);

        let other = registration_error(anyhow::anyhow!("disk full"));
        assert_eq!(other.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
