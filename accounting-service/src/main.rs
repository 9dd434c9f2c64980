use accounting_service::{
    build_router,
    config::{AccountingConfig, SessionBackend, StoreBackend},
    identity::build_provider,
    services::{MemorySessionStore, RedisSessionStore, ServiceError, SessionStore},
    store::{CredentialStore, MemoryCredentialStore, PgCredentialStore},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::{init_tracing, shutdown_tracing};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on invalid configuration
    let config = AccountingConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    accounting_service::services::metrics::init_metrics()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("metrics registry: {}", e)))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting accounting service"
    );

    let store: Arc<dyn CredentialStore> = match config.database.backend {
        StoreBackend::Postgres => {
            let url = config.database.url.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is not set"))
            })?;
            let store = PgCredentialStore::connect(url, config.database.max_connections)
                .await
                .map_err(ServiceError::from)?;
            store.initialize_schema().await.map_err(ServiceError::from)?;
            tracing::info!("Postgres credential store ready");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory credential store");
            Arc::new(MemoryCredentialStore::new())
        }
    };

    let session_store: Arc<dyn SessionStore> = match config.session.backend {
        SessionBackend::Redis => {
            let url = config.session.redis_url.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("REDIS_URL is not set"))
            })?;
            let sessions = RedisSessionStore::new(url).await?;
            tracing::info!("Redis session store ready");
            Arc::new(sessions)
        }
        SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
    };

    let provider = build_provider(&config.identity).map_err(ServiceError::from)?;
    tracing::info!(provider = provider.name(), "Identity provider configured");

    let state = AppState::new(config.clone(), store, session_store, provider)?;
    state.accounting.bootstrap().await?;

    let app = build_router(state);
    let addr = config.common.socket_addr();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown_tracing();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
