//! HTTP response types and utilities
//!
//! Standardized JSON envelope for API endpoints and the mapping from
//! `AppError` to HTTP status codes. Proxied responses bypass this module and
//! are returned verbatim.

use std::collections::HashMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, CompressionError, FetchError, UploadError};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error_with_details(message: String, details: HashMap<String, String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            details: Some(details),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(self)).into_response()
    }
}

fn detail(key: &str, value: impl Into<String>) -> Option<HashMap<String, String>> {
    Some(HashMap::from([(key.to_string(), value.into())]))
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> impl IntoResponse {
    let (status, message, details) = match &error {
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone(), None),
        AppError::Configuration { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Configuration error: {message}"),
            None,
        ),
        AppError::Unavailable { service } => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("{service} is not configured"),
            None,
        ),
        AppError::Compression(CompressionError::Decode(reason)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Photo could not be decoded".to_string(),
            detail("reason", reason.clone()),
        ),
        AppError::Compression(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Photo compression failed".to_string(),
            None,
        ),
        AppError::Fetch(FetchError::Timeout { url }) => (
            StatusCode::GATEWAY_TIMEOUT,
            "Upstream request timed out".to_string(),
            detail("url", url.clone()),
        ),
        AppError::Fetch(FetchError::InvalidRequest(reason)) => (
            StatusCode::BAD_REQUEST,
            "Request could not be forwarded".to_string(),
            detail("reason", reason.clone()),
        ),
        AppError::Fetch(FetchError::Network { url, .. }) => (
            StatusCode::BAD_GATEWAY,
            "Upstream unreachable and no cached copy available".to_string(),
            detail("url", url.clone()),
        ),
        AppError::Upload(UploadError::InvalidPath(reason)) => {
            (StatusCode::BAD_REQUEST, reason.clone(), None)
        }
        AppError::Upload(UploadError::Rejected { status, message }) => (
            StatusCode::BAD_GATEWAY,
            format!("Photo storage rejected the upload ({status})"),
            detail("storage_message", message.clone()),
        ),
        AppError::Upload(UploadError::Http(_)) => (
            StatusCode::BAD_GATEWAY,
            "Photo storage communication failed".to_string(),
            None,
        ),
        AppError::Cache(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Offline cache operation failed".to_string(),
            None,
        ),
        AppError::Worker(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Offline worker lifecycle failed".to_string(),
            None,
        ),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {message}"),
            None,
        ),
    };

    let response = match details {
        Some(details) => ApiResponse::<()>::error_with_details(message, details),
        None => ApiResponse::<()>::error(message),
    };

    (status, Json(response)).into_response()
}

/// Success response helpers
pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Health status payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cache_name: String,
    /// State of the active offline worker, absent before the first registration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_state: Option<String>,
    pub clients: usize,
    pub uptime_seconds: i64,
}
