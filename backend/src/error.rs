//! Error handling for the tailoring shop backend
//!
//! Every failure maps to one JSON shape: `{ "error": { "code", "message", "field" } }`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid measurement field '{field}', allowed fields: {}", allowed.join(", "))]
    InvalidMeasurementField { field: String, allowed: Vec<String> },

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("{0} not found")]
    NotFound(String),

    // Business rule errors
    #[error("Insufficient stock for {material}: {available} available, {requested} requested")]
    InsufficientStock {
        material: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Stock for {material} cannot go negative: {current} on hand, {requested} requested")]
    NegativeStock {
        material: String,
        current: Decimal,
        requested: Decimal,
    },

    // External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::TokenExpired | AppError::InvalidToken | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. }
            | AppError::InvalidMeasurementField { .. }
            | AppError::InsufficientStock { .. }
            | AppError::NegativeStock { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InvalidMeasurementField { .. } => "INVALID_MEASUREMENT_FIELD",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::NegativeStock { .. } => "NEGATIVE_STOCK",
            AppError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    fn field(&self) -> Option<String> {
        match self {
            AppError::Validation { field, .. } => Some(field.clone()),
            AppError::InvalidMeasurementField { field, .. } => Some(field.clone()),
            AppError::Conflict { resource, .. } => Some(resource.clone()),
            _ => None,
        }
    }

    /// Message safe to show to clients; infrastructure details stay in the logs
    fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalError(_) | AppError::Configuration(_) => {
                "An internal server error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|field| field.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let error_detail = ErrorDetail {
            code: self.code().to_string(),
            message: self.public_message(),
            field: self.field(),
        };

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
