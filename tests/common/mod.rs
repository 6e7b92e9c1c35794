//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use estela_pod::compression::RasterEncoder;
use estela_pod::errors::{CompressionError, CompressionResult, FetchError, FetchResult};
use estela_pod::offline::{
    CacheStorage, Fetcher, FetchRequest, OfflineWorker, RequestDestination, ResponseSnapshot,
    RoutingRules, WorkerOptions,
};

pub const ORIGIN: &str = "https://pod.example";

/// How the scripted network answers a path
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, &'static str),
    Offline,
    /// Never settles
    Hang,
}

/// Network fake keyed by URL path; unknown paths answer 404
#[derive(Default)]
pub struct ScriptedFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<FetchRequest>>,
    extra_headers: Mutex<HeaderMap>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(self: Arc<Self>, path: &str, reply: Reply) -> Arc<Self> {
        self.set(path, reply);
        self
    }

    pub fn set(&self, path: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(path.to_string(), reply);
    }

    /// Every path answers `reply` from now on
    pub fn set_all(&self, reply: Reply) {
        for value in self.replies.lock().unwrap().values_mut() {
            *value = reply.clone();
        }
    }

    /// Attach a raw header to every response from now on
    pub fn set_header(&self, name: &'static str, value: HeaderValue) {
        self.extra_headers.lock().unwrap().insert(name, value);
    }

    /// Every request that reached the network, in order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == path).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<ResponseSnapshot> {
        let path = request.url.path().to_string();
        self.calls.lock().unwrap().push(path.clone());
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().get(&path).cloned();

        match reply.unwrap_or(Reply::Status(404, "not found")) {
            Reply::Status(status, body) => {
                let mut response = ResponseSnapshot::new(status, body)
                    .with_header("content-type", "text/plain")
                    .with_url(request.url.as_str());
                response
                    .headers
                    .extend(self.extra_headers.lock().unwrap().clone());
                Ok(response)
            }
            Reply::Offline => Err(FetchError::network(request.url.as_str(), "offline")),
            Reply::Hang => futures::future::pending().await,
        }
    }
}

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn document(path: &str) -> FetchRequest {
    FetchRequest::get(url(path)).with_destination(RequestDestination::Document)
}

pub fn asset(path: &str, destination: RequestDestination) -> FetchRequest {
    FetchRequest::get(url(path)).with_destination(destination)
}

pub fn options(cache_name: &str) -> WorkerOptions {
    WorkerOptions {
        cache_name: cache_name.to_string(),
        app_shell: vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/manifest.json".to_string(),
        ],
        origin: Url::parse(ORIGIN).unwrap(),
        rules: RoutingRules::default(),
    }
}

/// Scripted network that serves the app shell of [`options`]
pub fn shell_network() -> Arc<ScriptedFetcher> {
    ScriptedFetcher::new()
        .with("/", Reply::Status(200, "<html>shell</html>"))
        .with("/index.html", Reply::Status(200, "<html>shell</html>"))
        .with("/manifest.json", Reply::Status(200, "{\"name\":\"Estela\"}"))
}

pub fn worker(
    cache_name: &str,
    network: Arc<ScriptedFetcher>,
    storage: Arc<dyn CacheStorage>,
) -> Arc<OfflineWorker> {
    Arc::new(OfflineWorker::new(options(cache_name), network, storage))
}

/// Encoder whose output size is a fixed function of quality
///
/// `bytes_per_point` bytes per quality percent, so quality 0.8 at 10_000
/// bytes per point produces an 800_000-byte "JPEG". Records every call.
#[derive(Clone)]
pub struct SizedEncoder {
    bytes_per_point: usize,
    calls: Arc<Mutex<Vec<(f32, u32, u32)>>>,
}

impl SizedEncoder {
    pub fn new(bytes_per_point: usize) -> Self {
        Self {
            bytes_per_point,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `(quality, width, height)` of every encode, in order
    pub fn calls(&self) -> Vec<(f32, u32, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RasterEncoder for SizedEncoder {
    fn encode(&self, raster: &RgbImage, quality: f32) -> CompressionResult<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((quality, raster.width(), raster.height()));
        let points = (quality * 100.0).round() as usize;
        Ok(vec![0u8; points * self.bytes_per_point])
    }
}

pub struct FailingEncoder;

impl RasterEncoder for FailingEncoder {
    fn encode(&self, _raster: &RgbImage, _quality: f32) -> CompressionResult<Vec<u8>> {
        Err(CompressionError::Encode("encoder out of memory".to_string()))
    }
}

fn noisy(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(2_654_435_761).wrapping_add(y.wrapping_mul(40_503));
        Rgb([(v >> 3) as u8, (v >> 11) as u8, (v >> 19) as u8])
    })
}

fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

/// Uniformly coloured PNG; cheap to decode at any size
pub fn solid_png(width: u32, height: u32) -> Vec<u8> {
    encode(&RgbImage::from_pixel(width, height, Rgb([40, 90, 160])), ImageFormat::Png)
}

/// High-entropy PNG, hard for JPEG to shrink
pub fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    encode(&noisy(width, height), ImageFormat::Png)
}

pub fn noisy_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&noisy(width, height), ImageFormat::Jpeg)
}
