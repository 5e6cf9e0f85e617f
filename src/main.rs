use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use reco_survey_api::{
    config::{Config, StorageBackend},
    db::{
        create_pool, create_redis_client, AnalyticsStore, Cache, CacheWriterHandle, FileStore,
        InteractionSink, PgStore, UserStore,
    },
    routes::{create_router, AppState},
    services::{
        catalog::{CachedVideoCatalog, PgVideoCatalog, StaticVideoCatalog},
        providers::HttpRecommendationProvider,
        RecommendationAssembler, SessionRegistry, VideoCatalog,
    },
};

struct Backend {
    store: Arc<dyn AnalyticsStore>,
    users: Arc<dyn UserStore>,
    catalog: Arc<dyn VideoCatalog>,
}

async fn open_backend(config: &Config) -> anyhow::Result<Backend> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url)
                .await
                .context("Failed to connect to Postgres")?;

            if config.run_migrations {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to run migrations")?;
                tracing::info!("Database migrations applied");
            }

            let store = Arc::new(PgStore::new(pool.clone()));
            Ok(Backend {
                store: store.clone(),
                users: store,
                catalog: Arc::new(PgVideoCatalog::new(pool)),
            })
        }
        StorageBackend::File => {
            let store = Arc::new(FileStore::open(&config.data_dir).await?);
            let catalog = match &config.catalog_file {
                Some(path) => StaticVideoCatalog::from_json_file(path)
                    .await
                    .with_context(|| format!("Failed to load catalog from {}", path))?,
                None => {
                    tracing::warn!("CATALOG_FILE not set, filler comes from fallback videos only");
                    StaticVideoCatalog::new(vec![])
                }
            };

            Ok(Backend {
                store: store.clone(),
                users: store,
                catalog: Arc::new(catalog),
            })
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        backend = ?config.storage_backend,
        service = %config.recommendation_service_url,
        "Configuration loaded"
    );

    let backend = open_backend(&config).await?;

    let mut cache_handle: Option<CacheWriterHandle> = None;
    let catalog: Arc<dyn VideoCatalog> = match &config.redis_url {
        Some(url) => {
            let (cache, handle) = Cache::new(create_redis_client(url)?);
            cache_handle = Some(handle);
            tracing::info!("Catalog lookups cached in Redis");
            Arc::new(CachedVideoCatalog::new(backend.catalog, cache))
        }
        None => backend.catalog,
    };

    let provider = HttpRecommendationProvider::new(
        config.recommendation_service_url.clone(),
        config.recommendation_timeout(),
    )?;

    let (sink, sink_handle) = InteractionSink::new(backend.store.clone());
    let sessions = SessionRegistry::new();
    let sweeper = sessions.spawn_sweeper(config.session_idle_ttl());

    let state = Arc::new(AppState {
        assembler: RecommendationAssembler::new(Arc::new(provider), catalog),
        store: backend.store,
        users: backend.users,
        sink,
        sessions,
        target_total: config.target_total,
        recommended_target: config.recommended_target,
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    sink_handle.shutdown().await;
    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    Ok(())
}
