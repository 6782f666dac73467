//! Keyhold server entry point.
//!
//! Builds the storage backend and services, bootstraps the first super
//! admin if configured, then starts the Axum HTTP server with graceful
//! shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use keyhold_core::crypto::{Argon2Hasher, random_secret};
use keyhold_core::memory::MemoryStore;
use keyhold_core::store::Store;
use keyhold_core::token::JwtTokens;

use keyhold_server::config::{ServerConfig, StorageBackendType};
use keyhold_server::routes::build_router;
use keyhold_server::state::AppState;

/// Length of the signing key generated when none is configured.
const EPHEMERAL_SECRET_LEN: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(storage = ?config.storage_backend, "Keyhold starting");

    let state = build_app_state(&config).await?;

    if let Some(bootstrap) = &config.bootstrap {
        let created = state
            .users
            .bootstrap_super_admin(&bootstrap.email, &bootstrap.name, &bootstrap.password)
            .await
            .context("failed to bootstrap super admin")?;
        if created.is_none() {
            info!("super admin already present, skipping bootstrap");
        }
    }

    let app = build_router(Arc::clone(&state), config.request_timeout);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Keyhold server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Keyhold server stopped");
    Ok(())
}

/// Build the store, hasher, token issuer, and services.
async fn build_app_state(config: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let store: Arc<dyn Store> = match &config.storage_backend {
        StorageBackendType::Memory => {
            info!("using in-memory storage (data will not persist)");
            Arc::new(MemoryStore::new())
        }
        #[cfg(feature = "postgres-backend")]
        StorageBackendType::Postgres { url } => {
            info!("using PostgreSQL storage");
            Arc::new(
                keyhold_core::postgres::PostgresStore::connect(
                    url,
                    &keyhold_core::postgres::PostgresOptions::default(),
                )
                .await
                .context("failed to connect to PostgreSQL")?,
            )
        }
        #[cfg(not(feature = "postgres-backend"))]
        StorageBackendType::Postgres { .. } => {
            anyhow::bail!("PostgreSQL backend requested but feature 'postgres-backend' is not enabled");
        }
    };

    let argon2 = config.argon2;
    let hasher = Arc::new(
        Argon2Hasher::new(argon2.memory_kib, argon2.iterations, argon2.parallelism)
            .context("invalid Argon2 parameters")?,
    );

    let secret = if let Some(secret) = &config.jwt_secret {
        secret.as_bytes().to_vec()
    } else {
        warn!("KEYHOLD_JWT_SECRET not set; using a random secret, tokens will not survive a restart");
        random_secret(EPHEMERAL_SECRET_LEN)
    };
    let ttl = chrono::Duration::from_std(config.token_ttl).context("token TTL out of range")?;
    let tokens = Arc::new(JwtTokens::new(&secret, ttl));

    let state = AppState::new(store, hasher, tokens)
        .with_oauth_bridge_secret(config.oauth_bridge_secret.clone());
    Ok(Arc::new(state))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
