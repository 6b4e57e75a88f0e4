use anyhow::{Context, Result};
use axum::http::HeaderName;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod keep_warm;
mod models;
mod routes;
mod services;

use handlers::upload_handlers::{IdentityHeader, UploadState};
use services::{
    azure_blob::AzureBlobStore, azure_client::AzureClient, azure_share::AzureShareStore,
    connection::StorageConnection, mover_service::BlobToShareMover,
    upload_service::UploadService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting secure-upload (role {:?}, identity header {}, keep-warm {:?})",
        cfg.role,
        cfg.identity_header,
        cfg.keep_warm
    );

    // --- Storage clients ---
    let public = StorageConnection::parse(&cfg.public_storage)
        .context("parsing public storage connection string")?;
    tracing::info!("Public storage account: {}", public.account);
    let public_client = AzureClient::new(public).context("building public storage client")?;
    let public_store = Arc::new(AzureBlobStore::new(public_client.clone()));

    let upload_state = if cfg.role.serves_web() {
        let identity = HeaderName::from_bytes(cfg.identity_header.as_bytes())
            .with_context(|| format!("invalid identity header `{}`", cfg.identity_header))?;
        Some(UploadState {
            service: UploadService::new(public_store.clone()),
            identity: IdentityHeader(identity),
        })
    } else {
        None
    };

    let shutdown = CancellationToken::new();
    let mut keep_warm = None;

    let mover = match cfg.private_storage.as_deref().filter(|_| cfg.role.serves_mover()) {
        Some(raw) => {
            let private = StorageConnection::parse(raw)
                .context("parsing private storage connection string")?;
            tracing::info!("Private storage account: {}", private.account);
            let private_client =
                AzureClient::new(private).context("building private storage client")?;
            let mover = BlobToShareMover::new(
                public_store.clone(),
                Arc::new(AzureShareStore::new(private_client)),
            )
            .with_source_account(public_client.account());

            keep_warm = Some(keep_warm::spawn(cfg.keep_warm, shutdown.clone()));
            Some(mover)
        }
        None => None,
    };

    // --- Build router ---
    let app = routes::routes::app(upload_state, mover);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Some(handle) = keep_warm {
        let ticks = handle.await.context("joining keep-warm timer")?;
        tracing::info!("Keep-warm timer stopped after {} tick(s)", ticks);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
