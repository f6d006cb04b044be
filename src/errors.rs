use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// Expected, non-fatal ledger outcomes. Each operation documents the subset it can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("That time slot is no longer available. Please pick another time.")]
    Conflict,

    #[error("Your selection expired. Please choose a time again.")]
    Expired,

    #[error("Something went wrong with your selection. Please retry.")]
    NotOwner,

    #[error("Something went wrong with your selection. Please retry.")]
    NotFound,

    #[error("That selection is not valid. Please choose a time from the list.")]
    Invalid,
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Conflict => "conflict",
            Rejection::Expired => "expired",
            Rejection::NotOwner => "not_owner",
            Rejection::NotFound => "not_found",
            Rejection::Invalid => "invalid",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Conflict => StatusCode::CONFLICT,
            Rejection::Expired => StatusCode::GONE,
            Rejection::NotOwner => StatusCode::FORBIDDEN,
            Rejection::NotFound => StatusCode::NOT_FOUND,
            Rejection::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string(), "code": self.code() });
        (self.status(), axum::Json(body)).into_response()
    }
}
