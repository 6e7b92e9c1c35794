use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::compression::CompressionConfig;
use crate::errors::AppError;

/// Prefix for environment variable overrides, e.g. `ESTELA_WORKER__CACHE_NAME`
pub const ENV_PREFIX: &str = "ESTELA_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub compression: CompressionSettings,
    pub upload: Option<UploadConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest request body accepted (photo uploads included)
    #[serde(default = "default_max_request_size", with = "duration_serde::byte_size")]
    pub max_request_size: usize,
}

/// Offline worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Versioned cache namespace; exactly one is live at a time
    #[serde(default = "default_cache_name")]
    pub cache_name: String,
    /// Paths pre-cached at install, in order
    #[serde(default = "default_app_shell")]
    pub app_shell: Vec<String>,
    /// Hostname substring identifying the managed backend
    #[serde(default = "default_backend_marker")]
    pub backend_marker: String,
    /// Path prefixes routed network-only, checked in order
    #[serde(default = "default_api_prefixes")]
    pub api_prefixes: Vec<String>,
    /// Origin the proxy fronts
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
    /// Directory holding persistent cache namespaces
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_fetch_timeout", with = "duration_serde::duration")]
    pub fetch_timeout: Duration,
}

/// Photo compression pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionSettings {
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: usize,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_quality_start")]
    pub quality_start: f32,
    #[serde(default = "default_quality_step")]
    pub quality_step: f32,
    #[serde(default = "default_quality_min")]
    pub quality_min: f32,
}

/// Remote photo storage settings (managed backend storage API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Backend base URL, e.g. `https://xyz.supabase.co`
    pub storage_url: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    pub api_key: String,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_request_size() -> usize {
    crate::utils::parse_bytes(DEFAULT_MAX_REQUEST_SIZE).unwrap_or(25 * 1024 * 1024)
}

// Worker defaults
fn default_cache_name() -> String {
    DEFAULT_CACHE_NAME.to_string()
}

fn default_app_shell() -> Vec<String> {
    DEFAULT_APP_SHELL.iter().map(|p| p.to_string()).collect()
}

fn default_backend_marker() -> String {
    DEFAULT_BACKEND_MARKER.to_string()
}

fn default_api_prefixes() -> Vec<String> {
    DEFAULT_API_PREFIXES.iter().map(|p| p.to_string()).collect()
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_fetch_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_FETCH_TIMEOUT).unwrap_or(Duration::from_secs(30))
}

// Compression defaults
fn default_max_size_bytes() -> usize {
    DEFAULT_MAX_PHOTO_SIZE_BYTES
}

fn default_max_dimension() -> u32 {
    DEFAULT_MAX_PHOTO_DIMENSION
}

fn default_quality_start() -> f32 {
    DEFAULT_PHOTO_QUALITY_START
}

fn default_quality_step() -> f32 {
    DEFAULT_PHOTO_QUALITY_STEP
}

fn default_quality_min() -> f32 {
    DEFAULT_PHOTO_QUALITY_MIN
}

// Upload defaults
fn default_bucket() -> String {
    DEFAULT_PHOTO_BUCKET.to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_size: default_max_request_size(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            app_shell: default_app_shell(),
            backend_marker: default_backend_marker(),
            api_prefixes: default_api_prefixes(),
            upstream_url: default_upstream_url(),
            cache_dir: default_cache_dir(),
            fetch_timeout: default_fetch_timeout(),
        }
    }
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            max_dimension: default_max_dimension(),
            quality_start: default_quality_start(),
            quality_step: default_quality_step(),
            quality_min: default_quality_min(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            worker: WorkerConfig::default(),
            compression: CompressionSettings::default(),
            upload: None,
        }
    }
}

impl WorkerConfig {
    /// Parsed upstream origin
    pub fn upstream(&self) -> Result<Url, AppError> {
        Url::parse(&self.upstream_url).map_err(|e| {
            AppError::configuration(format!(
                "worker.upstream_url '{}' is not a valid URL: {e}",
                self.upstream_url
            ))
        })
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Load configuration from a TOML file layered with `ESTELA_` environment overrides
    ///
    /// A default config file is written when `config_file` does not exist yet.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !Path::new(config_file).exists() {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
        }

        let config: Config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the pipeline or the worker misbehave
    pub fn validate(&self) -> Result<(), AppError> {
        let worker = &self.worker;
        if worker.cache_name.trim().is_empty() {
            return Err(AppError::configuration("worker.cache_name must not be empty"));
        }
        if worker.app_shell.is_empty() {
            return Err(AppError::configuration(
                "worker.app_shell must list at least one path",
            ));
        }
        worker.upstream()?;

        CompressionConfig::from(&self.compression)
            .validate()
            .map_err(|e| AppError::configuration(format!("compression: {e}")))?;

        if let Some(upload) = &self.upload {
            Url::parse(&upload.storage_url).map_err(|e| {
                AppError::configuration(format!(
                    "upload.storage_url '{}' is not a valid URL: {e}",
                    upload.storage_url
                ))
            })?;
            if upload.bucket.trim().is_empty() {
                return Err(AppError::configuration("upload.bucket must not be empty"));
            }
        }

        Ok(())
    }
}
