//! Proof-of-delivery photo upload to the managed backend's object storage
//!
//! Photos are stored under a deterministic path, `{pickup|delivery}/{parcel_id}.jpg`,
//! and re-uploading the same parcel photo replaces the previous object.

use std::fmt;
use std::str::FromStr;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::compression::{CompressedImage, JPEG_MIME_TYPE};
use crate::config::UploadConfig;
use crate::errors::{AppError, UploadError};

/// Stage of the delivery a photo documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoFolder {
    Pickup,
    Delivery,
}

impl PhotoFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
        }
    }
}

impl fmt::Display for PhotoFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoFolder {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(Self::Pickup),
            "delivery" => Ok(Self::Delivery),
            other => Err(UploadError::InvalidPath(format!(
                "unknown photo folder '{other}', expected 'pickup' or 'delivery'"
            ))),
        }
    }
}

/// Object path for a parcel photo
pub fn object_path(folder: PhotoFolder, parcel_id: &str) -> Result<String, UploadError> {
    let parcel_id = Uuid::parse_str(parcel_id)
        .map_err(|e| UploadError::InvalidPath(format!("parcel id '{parcel_id}': {e}")))?;
    Ok(format!("{folder}/{}.jpg", parcel_id.hyphenated()))
}

/// A stored photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedPhoto {
    pub path: String,
    pub public_url: String,
    pub size_bytes: usize,
    pub quality: f32,
}

/// Client for the backend's storage API
#[derive(Debug, Clone)]
pub struct PhotoUploader {
    client: reqwest::Client,
    storage_url: Url,
    bucket: String,
    api_key: String,
}

impl PhotoUploader {
    pub fn new(config: &UploadConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("estela-pod/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UploadError::from)?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: reqwest::Client, config: &UploadConfig) -> Result<Self, AppError> {
        let storage_url = Url::parse(config.storage_url.trim_end_matches('/')).map_err(|e| {
            AppError::configuration(format!(
                "upload.storage_url '{}' is not a valid URL: {e}",
                config.storage_url
            ))
        })?;
        Ok(Self {
            client,
            storage_url,
            bucket: config.bucket.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn endpoint(&self, segments: &[&str]) -> String {
        let base = self.storage_url.as_str().trim_end_matches('/');
        format!("{base}/storage/v1/object/{}", segments.join("/"))
    }

    /// Endpoint objects are written to
    pub fn object_url(&self, path: &str) -> String {
        self.endpoint(&[&self.bucket, path])
    }

    /// Publicly readable URL of a stored object
    pub fn public_url(&self, path: &str) -> String {
        self.endpoint(&["public", &self.bucket, path])
    }

    /// Upload `image` as the photo for `parcel_id`, replacing any previous one
    pub async fn upload(
        &self,
        folder: PhotoFolder,
        parcel_id: &str,
        image: &CompressedImage,
    ) -> Result<UploadedPhoto, UploadError> {
        let path = object_path(folder, parcel_id)?;
        let url = self.object_url(&path);
        debug!("Uploading {} bytes to {}/{}", image.len(), self.bucket, path);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, JPEG_MIME_TYPE)
            .header("x-upsert", "true")
            .body(image.bytes.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let public_url = self.public_url(&path);
        info!(
            "Stored {} photo for parcel {} ({} bytes at quality {:.2})",
            folder,
            parcel_id,
            image.len(),
            image.quality
        );

        Ok(UploadedPhoto {
            path,
            public_url,
            size_bytes: image.len(),
            quality: image.quality,
        })
    }
}
