//! Application error kinds with HTTP + scheduler-side handling.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Error response structure for consistent API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub correlation_id: String,
    pub timestamp: String,
}

/// Application error kinds. Named after the categories in the error handling design,
/// not after exception types: callers branch on the kind, not the message.
#[derive(Debug, Error)]
pub enum AppError {
    /// An integration is needed but its required settings are empty.
    #[error("configuration missing: {reason}")]
    ConfigMissing { reason: String },

    /// An external service returned an error or timed out.
    #[error("external service unavailable: {service}")]
    ExternalUnavailable { service: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("invalid {token}: {message}")]
    Invalid { token: String, message: String },

    /// Database unreachable past readiness backoff; fails startup.
    #[error("fatal: {message}")]
    Fatal { message: String },

    #[error("authentication token required")]
    TokenRequired,

    #[error("authentication token invalid or expired")]
    TokenInvalid,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("redis error")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("request body error")]
    JsonRejection(#[from] JsonRejection),

    #[error("internal error")]
    Internal { message: Option<String> },
}

impl AppError {
    pub fn config_missing(reason: impl Into<String>) -> Self {
        Self::ConfigMissing { reason: reason.into() }
    }

    pub fn external_unavailable(service: impl Into<String>) -> Self {
        Self::ExternalUnavailable { service: service.into() }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    pub fn invalid(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid { token: token.into(), message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConfigMissing { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalUnavailable { .. } => StatusCode::BAD_GATEWAY,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::Invalid { .. } | AppError::JsonRejection(_) => StatusCode::BAD_REQUEST,
            AppError::TokenRequired | AppError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AppError::Fatal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) | AppError::Redis(_) | AppError::Serialization(_) |
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::ConfigMissing { .. } => "CONFIG_MISSING",
            AppError::ExternalUnavailable { .. } => "EXTERNAL_UNAVAILABLE",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::Forbidden { .. } => "FORBIDDEN",
            AppError::Invalid { .. } => "INVALID",
            AppError::Fatal { .. } => "FATAL",
            AppError::TokenRequired => "TOKEN_REQUIRED",
            AppError::TokenInvalid => "TOKEN_INVALID",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Redis(_) => "REDIS_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::JsonRejection(_) => "JSON_REJECTION",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AppError::ConfigMissing { reason } => reason.clone(),
            AppError::ExternalUnavailable { service } => {
                format!("{service} is currently unavailable, try again shortly")
            }
            AppError::NotFound { resource } => format!("{resource} not found"),
            AppError::Conflict { message } => message.clone(),
            AppError::Forbidden { reason } => reason.clone(),
            AppError::Invalid { token, message } => format!("invalid {token}: {message}"),
            AppError::TokenRequired => "authentication required".to_string(),
            AppError::TokenInvalid => "invalid or expired session".to_string(),
            _ => "an unexpected error occurred".to_string(),
        }
    }

    /// Whether this kind represents a transient failure a scheduled task should
    /// retry next tick rather than treat as a permanent entity failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ExternalUnavailable { .. } | AppError::Database(_) | AppError::Redis(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let status = self.status_code();
        let error_code = self.error_code();
        let user_message = self.user_message();

        match &self {
            AppError::Fatal { .. } | AppError::Database(_) | AppError::Redis(_) | AppError::Internal { .. } => {
                tracing::error!(correlation_id = %correlation_id, error_code, error = %self, "server error");
            }
            AppError::ExternalUnavailable { service } => {
                tracing::warn!(correlation_id = %correlation_id, error_code, service, error = %self, "external service error");
            }
            _ => {
                tracing::info!(correlation_id = %correlation_id, error_code, error = %self, "client error");
            }
        }

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            message: user_message,
            details: match &self {
                AppError::Invalid { token, .. } => Some(json!({ "token": token })),
                _ => None,
            },
            correlation_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { message: Some(err.to_string()) }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
            | jsonwebtoken::errors::ErrorKind::InvalidToken => AppError::TokenInvalid,
            _ => AppError::Internal { message: Some(format!("jwt error: {err}")) },
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal { message: Some(format!("password hashing error: {err}")) }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
