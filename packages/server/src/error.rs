use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::MalformedInput;
use common::report::ReportError;
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `MALFORMED_INPUT`, `VALIDATION_ERROR`,
    /// `TOKEN_MISSING`, `TOKEN_INVALID`, `INVALID_CREDENTIALS`, `NOT_FOUND`,
    /// `USERNAME_TAKEN`, `PERSISTENCE_ERROR`, `INTERNAL_ERROR`.
    #[schema(example = "MALFORMED_INPUT")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "missing required columns: pressure")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    /// The uploaded file could not be parsed as an equipment table.
    MalformedInput(String),
    Validation(String),
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    NotFound(String),
    UsernameTaken,
    /// Database or blob storage failure. Nothing from the request was kept.
    Persistence(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::MalformedInput(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "MALFORMED_INPUT",
                    message: msg,
                },
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "INVALID_CREDENTIALS",
                    message: "Invalid username or password".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::UsernameTaken => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "USERNAME_TAKEN",
                    message: "Username is already taken".into(),
                },
            ),
            AppError::Persistence(detail) => {
                tracing::error!("Persistence error: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "PERSISTENCE_ERROR",
                        message: "Storage is unavailable, nothing was saved".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<MalformedInput> for AppError {
    fn from(err: MalformedInput) -> Self {
        AppError::MalformedInput(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SizeLimitExceeded { limit, .. } => {
                AppError::Validation(format!("Upload exceeds the {limit} byte limit"))
            }
            StorageError::InvalidKey(reason) => AppError::Validation(reason.to_string()),
            // A summary whose source file is gone is still a storage fault.
            StorageError::NotFound(key) => {
                AppError::Persistence(format!("blob missing: {key}"))
            }
            StorageError::Io(e) => AppError::Persistence(e.to_string()),
        }
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        AppError::Internal(err.to_string())
    }
}
