use std::{process, sync::Arc};

use anyhow::Context;
use clap::Parser;
use httpd::{
    config::{Args, Config},
    handler,
    server::Server,
    storage::fs::DirectoryStore,
    AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run(Args::parse()).await {
        tracing::error!("server failed: {err:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load(&args).context("invalid configuration")?;

    let directory = config
        .directory
        .canonicalize()
        .with_context(|| format!("cannot serve files from {}", config.directory.display()))?;
    tracing::info!(directory = %directory.display(), "serving files");

    let state = AppState {
        files: Arc::new(DirectoryStore::new(directory)),
    };
    let router = handler::routes().context("invalid route pattern")?;

    Server::new(state, router)
        .with_limits(config.max_head_bytes, config.max_body_bytes)
        .with_timeout(config.timeout())
        .with_max_connections(config.max_connections)
        .bind(&config.address)
        .await
        .with_context(|| format!("failed to listen on {}", config.address))
}
