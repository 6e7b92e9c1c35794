/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_REQUEST_SIZE: &str = "25MB";

// Offline worker defaults
// Bump the cache name whenever the app shell changes incompatibly.
pub const DEFAULT_CACHE_NAME: &str = "estela-pod-v1";
pub const DEFAULT_APP_SHELL: &[&str] = &["/", "/index.html"];
pub const DEFAULT_BACKEND_MARKER: &str = "supabase";
pub const DEFAULT_API_PREFIXES: &[&str] = &["/auth/", "/rest/", "/storage/"];
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:5173";
pub const DEFAULT_CACHE_DIR: &str = "./data/offline-cache";
pub const DEFAULT_FETCH_TIMEOUT: &str = "30s";

// Photo compression defaults
pub const DEFAULT_MAX_PHOTO_SIZE_BYTES: usize = 1_048_576; // 1MB
pub const DEFAULT_MAX_PHOTO_DIMENSION: u32 = 1920;
pub const DEFAULT_PHOTO_QUALITY_START: f32 = 0.8;
pub const DEFAULT_PHOTO_QUALITY_STEP: f32 = 0.1;
pub const DEFAULT_PHOTO_QUALITY_MIN: f32 = 0.4;

// Photo upload defaults
pub const DEFAULT_PHOTO_BUCKET: &str = "parcel-photos";
