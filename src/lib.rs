pub mod compression;
pub mod config;
pub mod errors;
pub mod offline;
pub mod upload;
pub mod utils;
pub mod web;
