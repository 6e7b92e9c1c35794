//! Centralized error handling for the Estela POD service
//!
//! Each subsystem owns a focused error enum, and `AppError` unifies them at the
//! edges (HTTP handlers, CLI) so failures are reported consistently.
//!
//! # Error Categories
//!
//! - **Compression Errors**: photo decode/encode failures and invalid pipeline settings
//! - **Fetch Errors**: network requests that were rejected (offline, DNS, timeouts)
//! - **Cache Errors**: on-device cache storage failures
//! - **Worker Errors**: offline worker lifecycle failures (install/activate)
//! - **Upload Errors**: remote photo storage failures
//!
//! # Usage
//!
//! ```rust
//! use estela_pod::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::validation("parcel id is required"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for compression pipeline Results
pub type CompressionResult<T> = Result<T, CompressionError>;

/// Convenience type alias for cache storage Results
pub type CacheResult<T> = Result<T, CacheError>;

/// Convenience type alias for network fetch Results
pub type FetchResult<T> = Result<T, FetchError>;
