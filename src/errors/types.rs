//! Error type definitions for the Estela POD service
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system that keeps subsystem failures
//! distinguishable while still converting cleanly into `AppError`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Photo compression failures
    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),

    /// Network fetch failures
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Offline cache storage failures
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Offline worker lifecycle failures
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Photo upload failures
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A collaborator that is required for the operation is not configured
    #[error("Service unavailable: {service}")]
    Unavailable { service: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Image compression pipeline errors
///
/// Decode and encode failures are fatal; exceeding the size budget at the
/// quality floor is not an error and never produces one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompressionError {
    /// The source could not be decoded (corrupt or unsupported input)
    #[error("Failed to decode source image: {0}")]
    Decode(String),

    /// The encoder could not produce a buffer
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// Pipeline settings are inconsistent
    #[error("Invalid compression settings: {0}")]
    InvalidConfig(String),

    /// A blocking pipeline stage was cancelled or panicked
    #[error("Compression task failed: {0}")]
    Task(String),
}

/// A network fetch that was rejected
///
/// HTTP error statuses are valid responses and are not represented here; only
/// transport-level failures (offline, DNS, connect, timeout) are.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Transport failure while talking to the network
    #[error("Network request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The request did not complete in time
    #[error("Network request to {url} timed out")]
    Timeout { url: String },

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// On-device cache storage errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry metadata could not be (de)serialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A namespace or entry path failed validation
    #[error("Path validation failed: {path:?} - {reason}")]
    PathValidation { path: PathBuf, reason: String },

    /// Only GET requests can be stored
    #[error("Request method '{method}' is unsupported by the cache")]
    UnsupportedMethod { method: String },

    /// The namespace was deleted while a handle to it was still in use
    #[error("Cache namespace '{name}' no longer exists")]
    NamespaceMissing { name: String },
}

/// Offline worker lifecycle errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// An app-shell resource could not be pre-cached
    #[error("Install failed for {url}: {reason}")]
    Install { url: String, reason: String },

    /// A lifecycle step was attempted from the wrong state
    #[error("Invalid worker state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    /// Cache storage failed during a lifecycle step
    #[error("Cache failure during lifecycle: {0}")]
    Cache(#[from] CacheError),

    /// The network rejected an app-shell fetch
    #[error("Fetch failure during lifecycle: {0}")]
    Fetch(#[from] FetchError),

    /// An app-shell URL could not be resolved against the origin
    #[error("Invalid app shell URL '{path}': {reason}")]
    InvalidUrl { path: String, reason: String },
}

/// Remote photo storage errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// HTTP client failures
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storage backend refused the object
    #[error("Storage rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The object path could not be built
    #[error("Invalid object path: {0}")]
    InvalidPath(String),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unavailable-collaborator error
    pub fn unavailable<S: Into<String>>(service: S) -> Self {
        Self::Unavailable {
            service: service.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl CacheError {
    pub fn path_validation<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::PathValidation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl FetchError {
    /// Build a network error from any displayable transport failure
    pub fn network<U: Into<String>, E: std::fmt::Display>(url: U, error: E) -> Self {
        Self::Network {
            url: url.into(),
            message: error.to_string(),
        }
    }
}
