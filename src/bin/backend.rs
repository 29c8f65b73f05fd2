use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use vidshare::{
    api::{self, ApiState},
    catalog::CatalogStore,
    config::{DEFAULT_CONFIG_PATH, RuntimeConfig, load_runtime_config_from},
    logging::init_logging,
    proxy::{ProxyState, YouTubeClient},
    storage::{SignedUrlResolver, StorageClient, UnconfiguredSigner, UrlSigner, UrlTtls},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the vidshare API and YouTube proxy.")]
struct Args {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the env-style config file")]
    config: PathBuf,
    #[arg(long = "host", value_name = "ADDR", help = "Override VIDSHARE_HOST")]
    host: Option<String>,
    #[arg(long = "port", value_name = "PORT", help = "Override VIDSHARE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_runtime_config_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    init_logging(&config.logging)?;

    let catalog = CatalogStore::open(&config.catalog_db).with_context(|| {
        format!("opening catalog at {}", config.catalog_db.display())
    })?;
    let resolver = SignedUrlResolver::with_ttls(
        build_signer(&config),
        UrlTtls {
            video_secs: config.video_url_ttl,
            thumbnail_secs: config.thumbnail_url_ttl,
        },
    );

    if config.youtube_api_key.is_none() {
        warn!("YOUTUBE_API_KEY is not set; the search proxy will answer 500");
    }
    let proxy_state = ProxyState::new(
        config.youtube_api_key.clone(),
        Arc::new(YouTubeClient::new(config.youtube_api_url.clone())),
    );

    let app = api::router(ApiState::new(catalog, resolver), proxy_state);

    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("parsing host {}", config.host))?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    info!("API server stopped");
    Ok(())
}

fn build_signer(config: &RuntimeConfig) -> Arc<dyn UrlSigner> {
    match (&config.storage_url, &config.storage_key) {
        (Some(url), Some(key)) => Arc::new(StorageClient::new(url.clone(), key.clone())),
        _ => {
            warn!("STORAGE_URL or STORAGE_KEY missing; media URLs will not resolve");
            Arc::new(UnconfiguredSigner)
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "failed to install Ctrl+C handler");
    }
}
