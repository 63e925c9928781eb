// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — HTTP scan server
//
// Entry point. Initialises logging, reads configuration, builds the scanner
// backend and artifact store, and serves the API over HTTP or HTTPS.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use scanwerk_bridge::scanner_backend;
use scanwerk_scan::ArtifactStore;
use scanwerk_server::{AppState, Cli, router};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli
        .load_config()
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let backend = scanner_backend(config.backend);
    info!(backend = backend.backend_name(), "Scanwerk starting");

    let store = ArtifactStore::from_config(&config.storage)
        .with_context(|| format!("failed to prepare {}", config.storage.path.display()))?;
    let state = AppState::new(backend, Arc::new(store));
    let app = router(state, &config.allowed_origins);

    let ip: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid listen address {:?}", config.host))?;
    let addr = SocketAddr::new(ip, config.port);

    match config.tls_pair() {
        Some((cert, key)) => {
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| anyhow::anyhow!("a TLS crypto provider is already installed"))?;
            let tls = RustlsConfig::from_pem_file(cert, key)
                .await
                .context("failed to load TLS certificate and key")?;

            info!(%addr, "listening (HTTPS)");
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            warn!("TLS is not configured; serving plain HTTP");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            info!(%addr, "listening (HTTP)");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    info!("Scanwerk stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
