//! HTTP request handlers
//!
//! - `health`: liveness and offline worker status
//! - `photos`: proof-of-delivery photo compression and upload
//! - `proxy`: every other request, served through the offline worker

pub mod health;
pub mod photos;
pub mod proxy;
