//! Error handling for the registry service
//!
//! This module provides:
//! - a single categorized `AppError` with struct variants
//! - RFC 7807 Problem Details responses for the HTTP surface
//! - retriability classification for store failures

pub mod types;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Standard error response format following RFC 7807 Problem Details
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub error_type: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    pub detail: String,

    /// A URI reference that identifies the specific occurrence
    pub instance: String,

    /// Request ID for tracing
    pub request_id: Option<String>,

    /// Whether the caller may retry the same request
    pub retriable: bool,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String, line: Option<usize> },

    // Storage errors
    #[error("Redis connection failed: {message}")]
    RedisConnection { message: String },

    #[error("Redis operation failed: {operation} - {message}")]
    RedisOperation { operation: String, message: String },

    #[error("Registry '{registry_id}' is contended: gave up after {attempts} attempts")]
    StoreContention { registry_id: String, attempts: u32 },

    // Registry data errors
    #[error("Registry '{registry_id}' holds a corrupt document: {message}")]
    CorruptRegistry { registry_id: String, message: String },

    #[error("Registry not found: {registry_id}")]
    RegistryNotFound { registry_id: String },

    // Validation errors
    #[error("Validation failed: {field} - {message}")]
    Validation { field: String, message: String },

    // System errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("IO operation failed: {operation} - {message}")]
    Io { operation: String, message: String },
}

impl AppError {
    /// Create a new configuration validation error
    pub fn config_validation(message: impl Into<String>, field: Option<impl Into<String>>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
            field: field.map(Into::into),
        }
    }

    /// Create a new internal error with context
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn corrupt_registry(registry_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptRegistry {
            registry_id: registry_id.into(),
            message: message.into(),
        }
    }

    /// Whether the failed operation left no trace and may be submitted again.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RedisConnection { .. } | Self::RedisOperation { .. } | Self::StoreContention { .. }
        )
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            Self::ConfigParse { .. } | Self::Validation { .. } | Self::Serialization { .. } => {
                StatusCode::BAD_REQUEST
            }

            // 404 Not Found
            Self::ConfigNotFound { .. } | Self::RegistryNotFound { .. } => StatusCode::NOT_FOUND,

            // 500 Internal Server Error
            Self::ConfigValidation { .. }
            | Self::CorruptRegistry { .. }
            | Self::Internal { .. }
            | Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            Self::RedisConnection { .. }
            | Self::RedisOperation { .. }
            | Self::StoreContention { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error type URI for RFC 7807 compliance
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ConfigValidation { .. } | Self::ConfigNotFound { .. } | Self::ConfigParse { .. } => {
                "https://key-registry.dev/errors/configuration"
            }
            Self::RedisConnection { .. }
            | Self::RedisOperation { .. }
            | Self::StoreContention { .. } => "https://key-registry.dev/errors/storage",
            Self::CorruptRegistry { .. } => "https://key-registry.dev/errors/corrupt-registry",
            Self::RegistryNotFound { .. } => "https://key-registry.dev/errors/not-found",
            Self::Validation { .. } | Self::Serialization { .. } => {
                "https://key-registry.dev/errors/validation"
            }
            _ => "https://key-registry.dev/errors/internal",
        }
    }

    /// Get a human-readable title for the error
    pub fn title(&self) -> &'static str {
        match self {
            Self::ConfigValidation { .. } | Self::ConfigNotFound { .. } | Self::ConfigParse { .. } => {
                "Configuration Error"
            }
            Self::RedisConnection { .. }
            | Self::RedisOperation { .. }
            | Self::StoreContention { .. } => "Storage Error",
            Self::CorruptRegistry { .. } => "Corrupt Registry",
            Self::RegistryNotFound { .. } => "Registry Not Found",
            Self::Validation { .. } | Self::Serialization { .. } => "Validation Error",
            _ => "Internal Server Error",
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self, request_id: Option<&str>) {
        let request_id = request_id.unwrap_or("unknown");

        if self.status_code().is_server_error() {
            error!(
                error = %self,
                request_id = request_id,
                error_type = self.error_type(),
                retriable = self.is_retriable(),
                "Application error occurred"
            );
        } else {
            warn!(
                error = %self,
                request_id = request_id,
                error_type = self.error_type(),
                "Client error occurred"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();

        self.log(Some(&request_id));

        let status = self.status_code();
        let error_response = ErrorResponse {
            error_type: self.error_type().to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: self.to_string(),
            instance: format!("/errors/{request_id}"),
            request_id: Some(request_id),
            retriable: self.is_retriable(),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;
