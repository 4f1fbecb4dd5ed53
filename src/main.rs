// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gitnest_server::{
    api::router,
    auth::PasswordHasher,
    config::{Config, Environment},
    kv::{KvStore, MemoryKv, RedisKv},
    mail::{
        HttpRelayTransport, LogTransport, MailQueue, MailTransport, MailWorker,
        DEFAULT_QUEUE_CAPACITY,
    },
    rate_limit::RateLimitConfig,
    repos::GitProvisioner,
    state::{AppState, AuthSettings, Collaborators},
    storage::Database,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format).context("Failed to install tracing subscriber")?;

    if config.uses_dev_secrets() {
        warn!("Using development token secrets; set JWT_ACCESS_SECRET and JWT_REFRESH_SECRET");
    }

    let kv: Arc<dyn KvStore> = if config.uses_memory_kv() {
        if config.environment == Environment::Production {
            warn!("In-process KV store in production: sessions are lost on restart and not shared");
        }
        Arc::new(MemoryKv::new())
    } else {
        Arc::new(
            RedisKv::connect(&config.redis_url)
                .await
                .context("Failed to connect to Redis")?,
        )
    };

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    let db = Arc::new(
        Database::open(&config.database_path()).context("Failed to open database")?,
    );
    info!(path = %config.database_path().display(), "Database opened");

    let shutdown = CancellationToken::new();

    let (mail, mail_rx) = MailQueue::channel(DEFAULT_QUEUE_CAPACITY);
    let transport: Arc<dyn MailTransport> = match &config.mail_relay_url {
        Some(url) => Arc::new(
            HttpRelayTransport::new(url.clone(), config.mail_from.clone())
                .context("Failed to build mail relay client")?,
        ),
        None => {
            warn!("MAIL_RELAY_URL not set; outgoing mail is only logged");
            Arc::new(LogTransport)
        }
    };
    let mail_worker = tokio::spawn(MailWorker::new(mail_rx, transport).run(shutdown.clone()));

    let deps = Collaborators {
        credentials: db.clone(),
        repositories: db,
        kv,
        mail,
        provisioner: Arc::new(GitProvisioner::new(&config.repos_root)),
    };
    let settings = AuthSettings {
        access_secret: config.access_secret.clone(),
        token_secret: config.refresh_secret.clone(),
        public_base_url: config.public_base_url.to_string(),
        passwords: PasswordHasher::new().context("Failed to configure password hasher")?,
        rate_limit: RateLimitConfig {
            limit: config.rate_limit_per_minute,
            trust_proxy_headers: config.trust_proxy_headers,
            ..RateLimitConfig::default()
        },
    };
    let state = AppState::new(deps, settings).context("Failed to build application state")?;
    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "gitnest listening (docs at /docs)");

    let signal = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal.cancel();
    })
    .await
    .context("HTTP server failed")?;

    shutdown.cancel();
    if let Err(e) = mail_worker.await {
        warn!(error = %e, "Mail worker task failed");
    }
    info!("Gracefully shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
