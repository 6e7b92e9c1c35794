//! Persistent on-disk cache storage
//!
//! Layout under the base directory:
//!
//! ```text
//! <base>/<namespace>/<digest>.json   entry metadata (key, status, headers, body digest)
//! <base>/<namespace>/<digest>.body   raw response body
//! ```
//!
//! Every file is written to a temporary name and renamed into place. The
//! metadata records the SHA-256 of the body it was written with, so a lookup
//! that races a concurrent replacement sees either the old or the new entry
//! (or a miss), never a mix of the two.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Cache, CacheStorage, ensure_storable};
use crate::errors::{CacheError, CacheResult};
use crate::offline::request::{CacheKey, FetchRequest};
use crate::offline::response::ResponseSnapshot;

const METADATA_EXTENSION: &str = "json";
const BODY_EXTENSION: &str = "body";
const TEMP_PREFIX: &str = ".tmp-";

/// Serialized form of an entry's metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    key: CacheKey,
    status: u16,
    headers: Vec<StoredHeader>,
    url: String,
    body_sha256: String,
    body_len: usize,
    stored_at: DateTime<Utc>,
}

/// One header field; values that are not UTF-8 are kept as hex
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredHeader {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value_hex: Option<String>,
}

fn encode_headers(headers: &HeaderMap) -> Vec<StoredHeader> {
    headers
        .iter()
        .map(|(name, value)| {
            let bytes = value.as_bytes();
            let (value, value_hex) = match std::str::from_utf8(bytes) {
                Ok(text) => (Some(text.to_string()), None),
                Err(_) => (None, Some(hex::encode(bytes))),
            };
            StoredHeader {
                name: name.as_str().to_string(),
                value,
                value_hex,
            }
        })
        .collect()
}

fn decode_headers(stored: Vec<StoredHeader>) -> Option<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(stored.len());
    for header in stored {
        let bytes = match (header.value, header.value_hex) {
            (Some(text), _) => text.into_bytes(),
            (None, Some(encoded)) => hex::decode(encoded).ok()?,
            (None, None) => return None,
        };
        let name = HeaderName::from_bytes(header.name.as_bytes()).ok()?;
        let value = HeaderValue::from_bytes(&bytes).ok()?;
        headers.append(name, value);
    }
    Some(headers)
}

fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Namespace names become directory names, so they must be a single plain component
fn validate_namespace(name: &str) -> CacheResult<()> {
    let reason = if name.is_empty() {
        Some("Namespace cannot be empty")
    } else if name.contains('\0') {
        Some("Namespace contains null bytes")
    } else if name.contains('/') || name.contains('\\') {
        Some("Namespace cannot contain path separators")
    } else if name == "." || name == ".." || name.contains("..") {
        Some("Namespace cannot contain '..'")
    } else if name.starts_with('.') {
        Some("Namespace cannot start with '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CacheError::path_validation(name, reason)),
        None => Ok(()),
    }
}

async fn set_secure_permissions(path: &Path) -> CacheResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        fs::set_permissions(path, perms).await?;
    }

    #[cfg(not(unix))]
    {
        if !path.exists() {
            return Err(CacheError::path_validation(path, "Directory does not exist"));
        }
    }

    Ok(())
}

/// Write `contents` to `target` via a temporary file in the same directory
async fn write_atomic(dir: &Path, target: &Path, contents: &[u8]) -> CacheResult<()> {
    let temp = dir.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
    if let Err(e) = fs::write(&temp, contents).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp, target).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

/// One namespace directory
#[derive(Debug)]
pub struct DiskCache {
    name: String,
    dir: PathBuf,
}

impl DiskCache {
    fn entry_paths(&self, key: &CacheKey) -> (PathBuf, PathBuf) {
        let stem = key.digest();
        (
            self.dir.join(format!("{stem}.{METADATA_EXTENSION}")),
            self.dir.join(format!("{stem}.{BODY_EXTENSION}")),
        )
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(CacheError::NamespaceMissing {
                name: self.name.clone(),
            })
        }
    }

    async fn write_entry(
        &self,
        request: &FetchRequest,
        response: ResponseSnapshot,
    ) -> CacheResult<()> {
        let key = request.cache_key();
        let (metadata_path, body_path) = self.entry_paths(&key);

        let entry = StoredEntry {
            key,
            status: response.status,
            headers: encode_headers(&response.headers),
            url: response.url,
            body_sha256: body_digest(&response.body),
            body_len: response.body.len(),
            stored_at: Utc::now(),
        };
        let metadata = serde_json::to_vec_pretty(&entry)?;

        write_atomic(&self.dir, &body_path, &response.body).await?;
        write_atomic(&self.dir, &metadata_path, &metadata).await?;
        Ok(())
    }
}

#[async_trait]
impl Cache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, request: &FetchRequest) -> CacheResult<Option<ResponseSnapshot>> {
        if !request.is_get() {
            return Ok(None);
        }

        let key = request.cache_key();
        let (metadata_path, body_path) = self.entry_paths(&key);

        let metadata = match fs::read(&metadata_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredEntry = serde_json::from_slice(&metadata)?;
        if entry.key != key {
            warn!("Digest collision in cache '{}' for {}", self.name, key);
            return Ok(None);
        }

        let body = match fs::read(&body_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if body.len() != entry.body_len || body_digest(&body) != entry.body_sha256 {
            debug!(
                "Entry body for {} in cache '{}' is mid-replacement; treating as miss",
                key, self.name
            );
            return Ok(None);
        }

        let Some(headers) = decode_headers(entry.headers) else {
            warn!(
                "Stored headers for {} in cache '{}' are unreadable; treating as miss",
                key, self.name
            );
            return Ok(None);
        };

        Ok(Some(ResponseSnapshot {
            status: entry.status,
            headers,
            body: Bytes::from(body),
            url: entry.url,
        }))
    }

    async fn put(&self, request: &FetchRequest, response: ResponseSnapshot) -> CacheResult<()> {
        ensure_storable(request)?;
        self.ensure_live()?;
        self.write_entry(request, response).await
    }

    async fn put_all(&self, entries: Vec<(FetchRequest, ResponseSnapshot)>) -> CacheResult<()> {
        for (request, _) in &entries {
            ensure_storable(request)?;
        }
        self.ensure_live()?;

        let mut written = Vec::with_capacity(entries.len());
        for (request, response) in entries {
            if let Err(e) = self.write_entry(&request, response).await {
                // roll back what this batch already wrote
                for request in &written {
                    let _ = self.delete(request).await;
                }
                return Err(e);
            }
            written.push(request);
        }
        Ok(())
    }

    async fn delete(&self, request: &FetchRequest) -> CacheResult<bool> {
        let (metadata_path, body_path) = self.entry_paths(&request.cache_key());
        let existed = match fs::remove_file(&metadata_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(&body_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(existed)
    }

    async fn len(&self) -> CacheResult<usize> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == METADATA_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Cache storage that survives process restarts
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    base_dir: PathBuf,
}

impl DiskCacheStorage {
    /// Open (creating if needed) the storage rooted at `base_dir`
    pub async fn new(base_dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await?;
        set_secure_permissions(&base_dir).await?;
        debug!("Offline cache storage at {}", base_dir.display());
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn namespace_dir(&self, name: &str) -> CacheResult<PathBuf> {
        validate_namespace(name)?;
        Ok(self.base_dir.join(name))
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn Cache>> {
        let dir = self.namespace_dir(name)?;
        if !dir.is_dir() {
            fs::create_dir_all(&dir).await?;
            set_secure_permissions(&dir).await?;
        }
        let cache: Arc<dyn Cache> = Arc::new(DiskCache {
            name: name.to_string(),
            dir,
        });
        Ok(cache)
    }

    async fn open_existing(&self, name: &str) -> CacheResult<Option<Arc<dyn Cache>>> {
        let dir = self.namespace_dir(name)?;
        if !dir.is_dir() {
            return Ok(None);
        }
        let cache: Arc<dyn Cache> = Arc::new(DiskCache {
            name: name.to_string(),
            dir,
        });
        Ok(Some(cache))
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.namespace_dir(name)?.is_dir())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut dir = fs::read_dir(&self.base_dir).await?;
        let mut names = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = item.file_name().to_str()
                && validate_namespace(name).is_ok()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        let dir = self.namespace_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
