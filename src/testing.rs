//! Test doubles for the store and key-value seams, plus a log event counter.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use sea_orm::DbErr;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    cache::{CacheManager, DEFAULT_TTL},
    kv::{CacheError, DEFAULT_MEMORY_CAPACITY, KeyValueStore, MemoryStore},
    models::{Actor, Category, Film, FilmActor, FilmCategory, FilmQuery},
    service::CatalogService,
    store::{FilmStore, StoreError},
};

pub fn film(film_id: i32) -> Film {
    Film {
        film_id,
        title: format!("FILM {film_id}"),
        description: None,
        release_year: Some(2006),
        language_id: 1,
        original_language_id: None,
        rental_duration: 3,
        rental_rate: 4.99,
        length: Some(90),
        replacement_cost: 19.99,
        rating: Some("PG".to_string()),
        special_features: vec!["Trailers".to_string()],
        actors: None,
        categories: None,
        last_update: jiff::Timestamp::UNIX_EPOCH,
    }
}

pub fn film_actor(film_id: i32, actor_id: i32) -> FilmActor {
    FilmActor {
        film_id,
        actor: Actor {
            actor_id,
            first_name: format!("FIRST{actor_id}"),
            last_name: format!("LAST{actor_id}"),
            last_update: jiff::Timestamp::UNIX_EPOCH,
        },
    }
}

pub fn film_category(film_id: i32, category_id: i32, name: &str) -> FilmCategory {
    FilmCategory {
        film_id,
        category: Category {
            category_id,
            name: name.to_string(),
            last_update: jiff::Timestamp::UNIX_EPOCH,
        },
    }
}

fn backend_failure() -> StoreError {
    StoreError::Database(DbErr::Custom("connection reset by peer".to_string()))
}

#[derive(Debug, Default)]
pub struct Calls {
    pub film: AtomicUsize,
    pub films: AtomicUsize,
    pub actors: AtomicUsize,
    pub categories: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.film.load(Ordering::SeqCst)
            + self.films.load(Ordering::SeqCst)
            + self.actors.load(Ordering::SeqCst)
            + self.categories.load(Ordering::SeqCst)
    }
}

/// In-memory [`FilmStore`] that records what it was asked for.
#[derive(Debug, Default)]
pub struct StubStore {
    pub films: Vec<Film>,
    pub actors: Vec<FilmActor>,
    pub categories: Vec<FilmCategory>,
    pub fail_films: bool,
    pub fail_associations: bool,
    pub calls: Calls,
    pub film_queries: Mutex<Vec<FilmQuery>>,
    pub actor_batches: Mutex<Vec<Vec<i32>>>,
    pub category_batches: Mutex<Vec<Vec<i32>>>,
}

impl StubStore {
    pub fn with_films(ids: impl IntoIterator<Item = i32>) -> Self {
        Self { films: ids.into_iter().map(film).collect(), ..Self::default() }
    }
}

#[async_trait]
impl FilmStore for StubStore {
    async fn query_film(&self, film_id: i32) -> Result<Film, StoreError> {
        self.calls.film.fetch_add(1, Ordering::SeqCst);
        if self.fail_films {
            return Err(backend_failure());
        }
        self.films.iter().find(|f| f.film_id == film_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn query_films(&self, query: &FilmQuery) -> Result<Vec<Film>, StoreError> {
        self.calls.films.fetch_add(1, Ordering::SeqCst);
        self.film_queries.lock().unwrap().push(query.clone());
        if self.fail_films {
            return Err(backend_failure());
        }
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(self
            .films
            .iter()
            .filter(|f| query.film_ids.is_empty() || query.film_ids.contains(&f.film_id))
            .skip(query.offset.unwrap_or(0) as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn query_film_actors(&self, film_ids: &[i32]) -> Result<Vec<FilmActor>, StoreError> {
        self.calls.actors.fetch_add(1, Ordering::SeqCst);
        self.actor_batches.lock().unwrap().push(film_ids.to_vec());
        if self.fail_associations {
            return Err(backend_failure());
        }
        Ok(self.actors.iter().filter(|a| film_ids.contains(&a.film_id)).cloned().collect())
    }

    async fn query_film_categories(
        &self,
        film_ids: &[i32],
    ) -> Result<Vec<FilmCategory>, StoreError> {
        self.calls.categories.fetch_add(1, Ordering::SeqCst);
        self.category_batches.lock().unwrap().push(film_ids.to_vec());
        if self.fail_associations {
            return Err(backend_failure());
        }
        Ok(self.categories.iter().filter(|c| film_ids.contains(&c.film_id)).cloned().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_films { Err(backend_failure()) } else { Ok(()) }
    }
}

/// Key-value store whose every operation fails.
#[derive(Debug, Default)]
pub struct DownStore {
    pub sets: AtomicUsize,
}

#[async_trait]
impl KeyValueStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

/// Key-value store that never answers within any reasonable timeout.
#[derive(Debug, Default)]
pub struct StalledKv;

#[async_trait]
impl KeyValueStore for StalledKv {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        tokio::time::sleep(STALL).await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        tokio::time::sleep(STALL).await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        tokio::time::sleep(STALL).await;
        Ok(())
    }
}

/// Key-value store that misses on read and panics on write.
#[derive(Debug, Default)]
pub struct PanickingKv;

#[async_trait]
impl KeyValueStore for PanickingKv {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        panic!("write to {key} blew up");
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Film store whose queries hang.
#[derive(Debug, Default)]
pub struct StalledStore;

#[async_trait]
impl FilmStore for StalledStore {
    async fn query_film(&self, _film_id: i32) -> Result<Film, StoreError> {
        tokio::time::sleep(STALL).await;
        Err(StoreError::NotFound)
    }

    async fn query_films(&self, _query: &FilmQuery) -> Result<Vec<Film>, StoreError> {
        tokio::time::sleep(STALL).await;
        Ok(Vec::new())
    }

    async fn query_film_actors(&self, _film_ids: &[i32]) -> Result<Vec<FilmActor>, StoreError> {
        tokio::time::sleep(STALL).await;
        Ok(Vec::new())
    }

    async fn query_film_categories(
        &self,
        _film_ids: &[i32],
    ) -> Result<Vec<FilmCategory>, StoreError> {
        tokio::time::sleep(STALL).await;
        Ok(Vec::new())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        tokio::time::sleep(STALL).await;
        Ok(())
    }
}

const STALL: Duration = Duration::from_secs(60 * 60);

pub fn memory_cache() -> CacheManager {
    let kv = Arc::new(MemoryStore::with_capacity(DEFAULT_MEMORY_CAPACITY));
    CacheManager::new(kv, "test", DEFAULT_TTL)
}

pub fn service(store: Arc<StubStore>, cache: CacheManager) -> CatalogService {
    CatalogService::new(store, cache)
}

/// Polls until `check` holds, giving detached tasks time to run.
pub async fn eventually(mut check: impl AsyncFnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Counts `error!` and `warn!` events emitted while its guard is installed.
#[derive(Clone, Debug, Default)]
pub struct EventCounter {
    errors: Arc<AtomicUsize>,
    warnings: Arc<AtomicUsize>,
}

impl EventCounter {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing_subscriber::registry().with(self.clone()).set_default()
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> tracing_subscriber::Layer<S> for EventCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        match *event.metadata().level() {
            Level::ERROR => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            },
            Level::WARN => {
                self.warnings.fetch_add(1, Ordering::SeqCst);
            },
            _ => {},
        }
    }
}
