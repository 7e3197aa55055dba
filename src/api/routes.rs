//! HTTP route handlers for the API

use super::AppState;
use crate::db::Database;
use crate::error::CoreError;
use crate::handlers::{
    iso_millis, parse_release_time, AdminOutcome, InitOutcome, LoginOutcome, SessionHandler,
    Target,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

// ============================================================================
// Errors
// ============================================================================

/// Failures surfaced to clients. Each maps to a fixed status and error tag.
#[derive(Debug)]
pub enum ApiError {
    WrongPasscode,
    Forbidden,
    InvalidCoordinates,
    InvalidTime,
    NotInitialized,
    Unavailable(CoreError),
    Internal(CoreError),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::WrongPasscode => (StatusCode::UNAUTHORIZED, "WRONG_PASSCODE"),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
            ApiError::InvalidCoordinates => (StatusCode::BAD_REQUEST, "Invalid coordinates"),
            ApiError::InvalidTime => (StatusCode::BAD_REQUEST, "Invalid time"),
            ApiError::NotInitialized => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session not initialized")
            }
            ApiError::Unavailable(e) => {
                tracing::error!("Database unavailable: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable")
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal server error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn admin_result(outcome: AdminOutcome) -> Result<Json<Value>, ApiError> {
    match outcome {
        AdminOutcome::Accepted => Ok(Json(serde_json::json!({ "success": true }))),
        AdminOutcome::Forbidden => Err(ApiError::Forbidden),
        AdminOutcome::NotInitialized => Err(ApiError::NotInitialized),
    }
}

// Malformed bodies are treated like empty ones so they fail the same way a
// wrong code does.
fn body_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    payload.map(|Json(body)| body).unwrap_or_default()
}

// ============================================================================
// Health Check
// ============================================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ============================================================================
// Session
// ============================================================================

pub async fn init_session(
    State(state): State<AppState>,
    Extension(db): Extension<Arc<Database>>,
) -> Result<Json<Value>, ApiError> {
    let handler = SessionHandler::new(db, state.game);

    let body = match handler.init().await? {
        InitOutcome::Created => serde_json::json!({
            "created": true,
            "message": "Data created with timer"
        }),
        InitOutcome::AlreadyExists => serde_json::json!({
            "created": false,
            "message": "Data already exists"
        }),
    };
    Ok(Json(body))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub code: Value,
}

pub async fn login(
    State(state): State<AppState>,
    Extension(db): Extension<Arc<Database>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let req = body_or_default(payload);
    let handler = SessionHandler::new(db, state.game);

    match handler.login(req.code.as_str(), chrono::Utc::now()).await? {
        None => Err(ApiError::NotInitialized),
        Some(LoginOutcome::Denied) => Err(ApiError::WrongPasscode),
        Some(outcome) => Ok(Json(outcome)),
    }
}

// ============================================================================
// Admin Updates
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLocationRequest {
    #[serde(default)]
    pub lat: Value,
    #[serde(default)]
    pub lng: Value,
    #[serde(default)]
    pub secret: Value,
}

impl UpdateLocationRequest {
    fn target(&self) -> Option<Target> {
        let target = Target {
            lat: self.lat.as_f64()?,
            lng: self.lng.as_f64()?,
        };
        target.is_valid().then_some(target)
    }
}

pub async fn update_location(
    State(state): State<AppState>,
    Extension(db): Extension<Arc<Database>>,
    payload: Result<Json<UpdateLocationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let req = body_or_default(payload);
    let Some(secret) = req.secret.as_str() else {
        return Err(ApiError::Forbidden);
    };
    let handler = SessionHandler::new(db, state.game);

    match req.target() {
        Some(target) => admin_result(handler.update_location(secret, target).await?),
        // The secret is still checked first so a bad secret never learns
        // anything about the payload
        None => admin_result(handler.verify_admin(secret).await?)
            .and(Err(ApiError::InvalidCoordinates)),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTimeRequest {
    #[serde(default)]
    pub new_time: Value,
    #[serde(default)]
    pub secret: Value,
}

pub async fn update_time(
    State(state): State<AppState>,
    Extension(db): Extension<Arc<Database>>,
    payload: Result<Json<UpdateTimeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let req = body_or_default(payload);
    let Some(secret) = req.secret.as_str() else {
        return Err(ApiError::Forbidden);
    };
    let handler = SessionHandler::new(db, state.game);

    match parse_release_time(&req.new_time) {
        Some(release_time) => {
            admin_result(handler.update_release_time(secret, release_time).await?)
        }
        None => admin_result(handler.verify_admin(secret).await?).and(Err(ApiError::InvalidTime)),
    }
}

// ============================================================================
// Status
// ============================================================================

pub async fn status(
    State(state): State<AppState>,
    Extension(db): Extension<Arc<Database>>,
) -> Result<Json<Value>, ApiError> {
    let handler = SessionHandler::new(db, state.game);

    let body = match handler.status().await? {
        Some(release_time) => serde_json::json!({
            "release_time": iso_millis::format(&release_time)
        }),
        None => serde_json::json!({ "error": "No Data" }),
    };
    Ok(Json(body))
}
