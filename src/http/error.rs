use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::engine::EngineError;

/// Body of every non-2xx response.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Access denied. Admin role required.")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map an engine error raised while handling `what` ("Booking", "Room", ...).
    pub fn from_engine(what: &str, err: EngineError) -> Self {
        match err {
            EngineError::NotFound(_) => ApiError::NotFound(format!("{what} not found.")),
            EngineError::Conflict(_) => ApiError::Conflict("This time slot is already booked.".into()),
            EngineError::UsernameTaken(_) => ApiError::Conflict("Username already taken.".into()),
            EngineError::AlreadyExists(id) => ApiError::Conflict(format!("{what} {id} already exists.")),
            e @ (EngineError::Invalid(_)
            | EngineError::OutsideOperatingHours { .. }
            | EngineError::LimitExceeded(_)) => ApiError::BadRequest(e.to_string()),
            EngineError::WalError(e) => {
                error!(error = %e, "storage failure");
                ApiError::Internal("could not persist change".into())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = MessageBody {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
