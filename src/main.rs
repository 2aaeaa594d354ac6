use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunify_api::{
    config::{Config, HistoryBackend},
    db::{self, CatalogStore, HistorySink, PgCatalogStore, SnapshotCatalogStore},
    routes::{create_router, AppState},
    services::{HistoryLogger, HistoryLoggerHandle, RecommendationEngine},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tunify_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let settings = config.engine_settings()?;

    let pool = if config.uses_postgres() {
        let pool = db::create_pool(&config.database_url).await?;
        if config.run_migrations {
            db::run_migrations(&pool).await?;
        }
        Some(pool)
    } else {
        None
    };

    let catalog: Arc<dyn CatalogStore> = match (&config.catalog_snapshot_path, &pool) {
        (Some(path), _) => {
            let snapshot = SnapshotCatalogStore::from_json_file(path)?;
            snapshot.ensure_hierarchy(&settings.hierarchy)?;
            Arc::new(snapshot)
        }
        (None, Some(pool)) => Arc::new(PgCatalogStore::new(pool.clone())),
        (None, None) => anyhow::bail!("No catalog source configured"),
    };

    let history_sink: Option<Arc<dyn HistorySink>> = match config.history_backend {
        HistoryBackend::None => None,
        HistoryBackend::Postgres => pool
            .clone()
            .map(|pool| Arc::new(db::PgHistorySink::new(pool)) as Arc<dyn HistorySink>),
        HistoryBackend::Redis => {
            let client = db::create_redis_client(&config.redis_url)?;
            Some(Arc::new(db::RedisHistorySink::new(
                client,
                config.history_redis_key.clone(),
                config.history_redis_max_len,
            )) as Arc<dyn HistorySink>)
        }
    };

    let mut engine = RecommendationEngine::new(catalog.clone(), settings);
    let mut history_handle: Option<HistoryLoggerHandle> = None;
    if let Some(sink) = history_sink {
        let (logger, handle) = HistoryLogger::spawn(sink);
        engine = engine.with_history(logger);
        history_handle = Some(handle);
    }

    tracing::info!(
        catalog = catalog.name(),
        history = ?config.history_backend,
        with_fallback = config.cluster_with_fallback,
        scan_limit = config.catalog_scan_limit,
        "Recommendation engine ready"
    );

    let state = AppState {
        engine: Arc::new(engine),
        catalog,
        search_limit: config.search_limit,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = history_handle {
        handle.shutdown().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
