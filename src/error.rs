//! Error types for the library server

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// No `Authorization: Bearer` header at all. Answered with an empty body.
    #[error("missing or malformed authorization header")]
    MissingCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

impl IntoResponse for AppError {
    // Conflicts and lookup misses are reported as 500: clients of the
    // existing API only distinguish 400, 401 and 500.
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::MissingCredentials => return StatusCode::UNAUTHORIZED.into_response(),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) | AppError::NotFound(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Storage { context, source } => {
                tracing::error!(error = ?source, "{}", context);
                (StatusCode::INTERNAL_SERVER_ERROR, context)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("invalid {}", field),
                })
            })
            .collect();
        messages.sort();
        messages.dedup();
        AppError::InvalidInput(messages.join(", "))
    }
}

/// Attach operation context to a storage driver error.
pub trait StorageContext<T> {
    fn context(self, context: &str) -> AppResult<T>;
}

impl<T> StorageContext<T> for Result<T, sqlx::Error> {
    fn context(self, context: &str) -> AppResult<T> {
        self.map_err(|source| AppError::Storage {
            context: context.to_string(),
            source,
        })
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
