//! Error types and handling
//!
//! All directory operations return [`AppError`]. Callers translate the error
//! kind into their own response format; the CLI prints it as an
//! [`ErrorResponse`] JSON document.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced tenant does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Re-parent target is the node itself or inside its own subtree
    #[error("Invalid hierarchy move: {0}")]
    InvalidHierarchyMove(String),

    /// A descendant rewrite failed; the whole move was rolled back
    #[error("Cascade aborted while moving tenant {tenant_id}: {reason}")]
    CascadeAborted { tenant_id: Uuid, reason: String },

    /// Input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique constraint violation (duplicate code or path)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store-level failure, passed through unmodified
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a missing tenant
    pub fn tenant_not_found(id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("Tenant {} not found", id))
    }

    /// Stable identifier of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidHierarchyMove(_) => "invalid_hierarchy_move",
            AppError::CascadeAborted { .. } => "cascade_aborted",
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) => "database_error",
            AppError::Config(_) => "config_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// Error response body
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the error response
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let response = ErrorResponse::new(err.kind(), err.to_string());
        match err {
            AppError::CascadeAborted { tenant_id, .. } => {
                response.with_details(serde_json::json!({ "tenant_id": tenant_id }))
            }
            _ => response,
        }
    }
}

// Implement From for common error types

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Repository errors arrive wrapped in context; keep the sqlx mapping
        match err.downcast::<sqlx::Error>() {
            Ok(sqlx_err) => sqlx_err.into(),
            Err(other) => AppError::Internal(format!("{:#}", other)),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation()
                    || db_err.message().contains("UNIQUE constraint failed")
                {
                    AppError::Conflict(db_err.message().to_string())
                } else {
                    AppError::Database(db_err.to_string())
                }
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type alias for directory operations
pub type AppResult<T> = Result<T, AppError>;
