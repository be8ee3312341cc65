use crate::domain::Report;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Accept a report submitted as JSON. The body is validated but not persisted.
pub async fn register(
    payload: Result<Json<Report>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(report) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected registration");
        ApiError::BadRequest(rejection.body_text())
    })?;

    debug!(
        username = %report.username,
        game = %report.game_name,
        "Report registered"
    );

    Ok(Json(RegisterResponse {
        message: "User registered successfully",
    }))
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
