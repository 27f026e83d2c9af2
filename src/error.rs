use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Username already taken")]
    DuplicateUsername,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("User not found")]
    UnknownOwner,

    #[error("Missing required query parameter: {0}")]
    MissingParameter(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("Stored credential is corrupt")]
    CorruptCredential,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DuplicateEmail | AppError::DuplicateUsername => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized | AppError::UnknownOwner => {
                StatusCode::UNAUTHORIZED
            }
            AppError::MissingParameter(_) | AppError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::CorruptCredential | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal(e) => error!(error = ?e, "request failed"),
            AppError::CorruptCredential => error!("stored password hash could not be parsed"),
            _ => {}
        }

        let mut res = (status, Json(json!({ "detail": self.to_string() }))).into_response();
        if matches!(self, AppError::Unauthorized | AppError::UnknownOwner) {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}
