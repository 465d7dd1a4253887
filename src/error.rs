use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::jwt::TokenError;
use crate::store::ConstraintViolation;

/// Every way a request can fail. Each variant maps to exactly one status code.
#[derive(Debug, Error)]
pub enum AppError {
    /// Password rejected by the acceptance policy before hashing.
    #[error("{0}")]
    WeakCredential(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("{0}")]
    Validation(String),

    #[error("password hashing failed: {0}")]
    HashFailure(String),

    /// Wrong password, or a stored hash that could not be parsed.
    #[error("Password invalid")]
    VerifyMismatch,

    #[error("User is not registered")]
    UserNotRegistered,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Authorization header is required")]
    MissingHeader,

    #[error("Token is required")]
    MissingToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    /// Anything else that went wrong while serving the request.
    #[error("{0}")]
    Unexpected(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::WeakCredential(_)
            | AppError::PasswordMismatch
            | AppError::Validation(_)
            | AppError::HashFailure(_)
            | AppError::Unexpected(_) => StatusCode::BAD_REQUEST,
            AppError::VerifyMismatch | AppError::MissingHeader | AppError::MissingToken => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Token(TokenError::Signing) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::UserNotRegistered | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Text sent to the client. Token verification failures all read the same.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Token(TokenError::Signing) => "token signing failed".to_string(),
            AppError::Token(_) => "Invalid token".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ConstraintViolation> for AppError {
    fn from(v: ConstraintViolation) -> Self {
        match v {
            ConstraintViolation::UsernameTaken
            | ConstraintViolation::EmailTaken
            | ConstraintViolation::SlugTaken => AppError::Conflict(v.to_string()),
            ConstraintViolation::UnknownUser => AppError::NotFound("User not found"),
            ConstraintViolation::UnknownPost => AppError::NotFound("Post not found"),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<ConstraintViolation>() {
            Some(v) => (*v).into(),
            None => AppError::Unexpected(format!("{e:#}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let message = self.public_message();
        let body = match status {
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => json!({ "message": message }),
            _ => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
