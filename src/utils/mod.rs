//! Utility modules shared across the service
//!
//! - `human_format` for byte sizes in configuration and logs
//! - `url` for origin resolution and credential-safe URL logging

pub mod human_format;
pub mod url;

pub use human_format::{format_bytes, parse_bytes};
pub use url::UrlUtils;
