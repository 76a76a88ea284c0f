mod cache;
mod config;
mod db;
mod error;
mod graphql;
mod health;
mod kv;
mod loader;
mod models;
mod query;
mod routes;
mod service;
mod store;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{ServiceExt, extract::Request};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cache::CacheManager,
    config::{Config, LogFormat},
    graphql::{CatalogSchema, build_schema},
    health::{HealthMonitor, POLL_INTERVAL},
    kv::{KeyValueStore, MemoryStore, RedisStore},
    service::CatalogService,
    store::SqlFilmStore,
};

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub schema: CatalogSchema,
    pub health: HealthMonitor,
}

fn init_tracing(format: LogFormat) {
    if format == LogFormat::Test {
        return;
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sakila_films=debug,sqlx=warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if format == LogFormat::Production {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.logger);

    let db = db::connect(&config).await?;
    let store = Arc::new(SqlFilmStore::new(db));

    let kv: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url, config.cache_timeout).await?),
        None => {
            tracing::warn!("REDIS_URL not set, caching in process memory");
            Arc::new(MemoryStore::with_capacity(config.memory_cache_capacity))
        },
    };
    let cache = CacheManager::new(kv, config.cache_key_prefix.clone(), config.cache_ttl)
        .with_timeout(config.cache_timeout);

    let catalog = CatalogService::new(store, cache).with_store_timeout(config.store_timeout);
    let schema = build_schema(catalog.clone());
    let health = HealthMonitor::start(catalog.clone(), POLL_INTERVAL).await;
    let state = Arc::new(AppState { catalog, schema, health });

    let app = routes::with_middleware(routes::router(state));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;

    Ok(())
}
