use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use estela_pod::{
    compression::{CompressionConfig, ImageCompressor, SourceImage},
    config::Config,
    offline::{DiskCacheStorage, HttpFetcher, OfflineWorker, WorkerHost, WorkerOptions},
    upload::PhotoUploader,
    utils::{UrlUtils, format_bytes},
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "estela-pod")]
#[command(version)]
#[command(about = "Proof-of-delivery photo compression and offline caching proxy")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the caching proxy and photo API
    Serve(ServeArgs),
    /// Compress a single photo file
    Compress(CompressArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Upstream origin to front (overrides config file)
    #[arg(short, long, value_name = "URL")]
    upstream: Option<String>,
}

#[derive(Args)]
struct CompressArgs {
    /// Photo to compress
    input: PathBuf,

    /// Output path (defaults to the input name with a .jpg extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Byte budget, e.g. 1048576 or 1MB
    #[arg(long, value_name = "SIZE")]
    max_size: Option<String>,

    /// Longest side in pixels
    #[arg(long, value_name = "PX")]
    max_dimension: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("estela_pod={},tower_http=trace", cli.log_level)
    } else {
        format!("estela_pod={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Serve(args) => serve(&cli.config, args).await,
        Command::Compress(args) => compress(&cli.config, args).await,
    }
}

async fn serve(config_file: &str, args: ServeArgs) -> Result<()> {
    info!("Starting Estela POD service v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(config_file)?;
    info!("Configuration loaded from: {}", config_file);

    // Override config with CLI arguments
    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }
    if let Some(upstream) = args.upstream {
        config.worker.upstream_url = upstream;
    }
    config.validate()?;

    info!(
        "Fronting upstream {}",
        UrlUtils::obfuscate_credentials(&config.worker.upstream_url)
    );

    let fetcher = Arc::new(HttpFetcher::new(config.worker.fetch_timeout)?);
    let storage = Arc::new(DiskCacheStorage::new(&config.worker.cache_dir).await?);
    info!(
        "Offline cache storage at {}",
        config.worker.cache_dir.display()
    );

    let host = Arc::new(WorkerHost::new(fetcher.clone()));
    let options = WorkerOptions::from_config(&config.worker)?;
    let worker = Arc::new(OfflineWorker::new(
        options.clone(),
        fetcher.clone(),
        storage.clone(),
    ));
    // The proxy still forwards traffic without a worker, so a failed install is not fatal
    if let Err(e) = host.register(worker).await {
        tracing::warn!("Offline worker registration failed: {}", e);
        let fallback = Arc::new(OfflineWorker::new(options, fetcher, storage));
        match host.resume(fallback).await {
            Ok(true) => info!("Resumed offline cache '{}'", config.worker.cache_name),
            Ok(false) => tracing::error!("No offline cache to resume, serving without cache"),
            Err(e) => tracing::error!("Failed to resume offline cache: {}", e),
        }
    }

    let compressor = ImageCompressor::new(CompressionConfig::from(&config.compression))?;
    let uploader = match &config.upload {
        Some(upload) => {
            info!("Photo uploads go to bucket '{}'", upload.bucket);
            Some(PhotoUploader::new(upload)?)
        }
        None => {
            info!("Photo upload not configured; upload endpoint will return 503");
            None
        }
    };

    let web_server = WebServer::new(config, host, compressor, uploader).await?;
    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );

    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server.serve_with_signal(server_ready_tx).await {
            tracing::error!("Web server failed: {}", e);
        }
    });

    match server_ready_rx.await {
        Ok(Ok(())) => info!("Web server is now listening"),
        Ok(Err(bind_error)) => {
            tracing::error!("Failed to bind web server: {}", bind_error);
            return Err(bind_error);
        }
        Err(_) => {
            tracing::error!("Web server task completed without signaling");
            return Err(anyhow::anyhow!("Web server failed to start"));
        }
    }

    server_handle.await?;
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());
    input.with_file_name(format!("{stem}.compressed.jpg"))
}

async fn compress(config_file: &str, args: CompressArgs) -> Result<()> {
    let settings = if Path::new(config_file).exists() {
        Config::load_from_file(config_file)?.compression
    } else {
        Default::default()
    };

    let mut config = CompressionConfig::from(&settings);
    if let Some(max_size) = &args.max_size {
        config.max_size_bytes = estela_pod::utils::parse_bytes(max_size)
            .with_context(|| format!("invalid --max-size '{max_size}'"))?;
    }
    if let Some(max_dimension) = args.max_dimension {
        config.max_dimension = max_dimension;
    }

    let source = SourceImage::from_path(&args.input)
        .await
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let input_len = source.len();

    let compressor = ImageCompressor::new(config.clone())?;
    let photo = compressor.compress(source).await?;

    let output = args.output.unwrap_or_else(|| default_output(&args.input));
    tokio::fs::write(&output, &photo.bytes)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    let verdict = if photo.is_within(config.max_size_bytes) {
        "within budget"
    } else {
        "over budget at quality floor"
    };
    info!(
        "{} -> {}: {} -> {} ({}x{}, quality {:.2}, {} attempt(s), {})",
        args.input.display(),
        output.display(),
        format_bytes(input_len),
        format_bytes(photo.len()),
        photo.width,
        photo.height,
        photo.quality,
        photo.attempts.len(),
        verdict
    );
    Ok(())
}
