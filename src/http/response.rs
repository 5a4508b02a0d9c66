//! JSON response bodies.
//!
//! Every error leaves the front-end as `{"status": "error", "message": ...}`
//! with the matching HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
}

pub fn error_response(code: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        status: "error".to_string(),
        message: message.into(),
    };
    (code, Json(body)).into_response()
}

pub fn health_response() -> Response {
    Json(HealthBody {
        status: "healthy".to_string(),
    })
    .into_response()
}
