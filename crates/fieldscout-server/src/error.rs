use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fieldscout_core::error::ValidationError;
use fieldscout_core::{ClaimsError, DenyReason, ErrorKind};
use fieldscout_storage::StorageError;
use serde::Serialize;

use crate::password::PasswordError;
use crate::token::TokenError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("invalid claims: {0}")]
    Claims(#[from] ClaimsError),

    #[error("{}", deny_message(.0))]
    Denied(#[from] DenyReason),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

fn deny_message(reason: &DenyReason) -> &'static str {
    match reason {
        DenyReason::NotAuthenticated => "authentication required",
        DenyReason::NotSelfOrAdmin => "only the identity itself or an admin may do this",
        DenyReason::CrossRealm => "operation crosses realm boundaries",
        DenyReason::AdminRequired => "admin role required",
        DenyReason::SuperAdminRequired => "super-admin role required",
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::InvalidCredentials => ErrorKind::Unauthenticated,
            ApiError::Token(e) => e.kind(),
            ApiError::Claims(e) => e.kind(),
            ApiError::Denied(reason) => reason.kind(),
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Validation(e) => e.kind(),
            ApiError::Storage(e) => e.kind(),
            ApiError::Password(_) => ErrorKind::Internal,
        }
    }

    /// Reason code for errors that are access decisions rather than faults.
    pub fn denial_code(&self) -> Option<&'static str> {
        match self {
            ApiError::Denied(reason) => Some(reason.as_str()),
            ApiError::InvalidCredentials => Some("invalid_credentials"),
            _ => None,
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        // Internal details stay in the logs.
        let error = match kind {
            ErrorKind::Internal => "internal server error".to_string(),
            _ => self.to_string(),
        };
        (status_for(kind), Json(ErrorResponse { error })).into_response()
    }
}
