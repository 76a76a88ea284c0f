//! Cache-aside reads over the film store.
//!
//! Every read tries the cache first, falls back to the store on a miss or on any
//! cache failure, and then repopulates the cache from a detached task so the
//! caller never waits on (or sees) the write.

use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, warn};

use crate::{
    cache::CacheManager,
    error::{AppResult, CatalogError},
    models::{Film, FilmActor, FilmCategory, FilmQuery, sorted_ids},
    store::{FilmStore, StoreError},
};

/// Whether film reads resolve actors and categories before returning.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Associations {
    Attach,
    /// Left to the caller, e.g. GraphQL field resolvers batching through a loader.
    Deferred,
}

/// Default bound on a single store query.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn FilmStore>,
    cache: CacheManager,
    store_timeout: Duration,
}

impl CatalogService {
    pub fn new(store: Arc<dyn FilmStore>, cache: CacheManager) -> Self {
        Self { store, cache, store_timeout: DEFAULT_STORE_TIMEOUT }
    }

    /// Bounds every store query; an elapsed query is reported as internal.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn FilmStore> {
        &self.store
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub async fn get_film(&self, film_id: i32) -> AppResult<Film> {
        self.get_film_with(film_id, Associations::Attach).await
    }

    pub async fn get_film_with(&self, film_id: i32, associations: Associations) -> AppResult<Film> {
        let key = self.cache.film_key(film_id, associations == Associations::Deferred);

        self.cache_aside(key, move || async move {
            let film = self.bounded(self.store.query_film(film_id)).await.map_err(|err| match err {
                StoreError::NotFound => CatalogError::NotFound,
                err => reported(err, "query film"),
            })?;

            let mut films = vec![film];
            if associations == Associations::Attach {
                self.attach_associations(&mut films).await?;
            }
            films.pop().ok_or(CatalogError::Internal)
        })
        .await
    }

    pub async fn get_films(&self, query: &FilmQuery) -> AppResult<Vec<Film>> {
        self.get_films_with(query, Associations::Attach).await
    }

    pub async fn get_films_with(
        &self,
        query: &FilmQuery,
        associations: Associations,
    ) -> AppResult<Vec<Film>> {
        let query = query.normalized();
        let key = self.cache.films_key(&query, associations == Associations::Deferred);

        self.cache_aside(key, move || async move {
            let mut films =
                self.bounded(self.store.query_films(&query))
                .await
                .map_err(|err| reported(err, "query films"))?;

            if associations == Associations::Attach {
                self.attach_associations(&mut films).await?;
            }
            Ok(films)
        })
        .await
    }

    pub async fn get_film_actors(&self, film_ids: &[i32]) -> AppResult<Vec<FilmActor>> {
        let ids = sorted_ids(film_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.cache.film_actors_key(&ids);

        self.cache_aside(key, move || async move {
            self.bounded(self.store.query_film_actors(&ids))
                .await
                .map_err(|err| reported(err, "query film actors"))
        })
        .await
    }

    pub async fn get_film_categories(&self, film_ids: &[i32]) -> AppResult<Vec<FilmCategory>> {
        let ids = sorted_ids(film_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.cache.film_categories_key(&ids);

        self.cache_aside(key, move || async move {
            self.bounded(self.store.query_film_categories(&ids))
                .await
                .map_err(|err| reported(err, "query film categories"))
        })
        .await
    }

    async fn cache_aside<T, F, Fut>(&self, key: String, fetch: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match self.cache.get::<T>(&key).await {
            Ok(Some(hit)) => {
                debug!(%key, "cache hit");
                return Ok(hit);
            },
            Ok(None) => debug!(%key, "cache miss"),
            Err(err) => warn!(%key, error = %err, "cache read failed, falling back to store"),
        }

        let value = fetch().await?;
        self.write_back(key, value.clone());
        Ok(value)
    }

    fn write_back<T>(&self, key: String, value: T)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            match AssertUnwindSafe(cache.set(&key, &value)).catch_unwind().await {
                Ok(Ok(())) => debug!(%key, "cache populated"),
                Ok(Err(err)) => warn!(%key, error = %err, "cache write-back failed"),
                Err(_) => error!(%key, "cache write-back panicked"),
            }
        });
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        }
    }

    /// Resolves actors and categories for every film in one batch each.
    /// Either lookup failing fails the whole read.
    async fn attach_associations(&self, films: &mut [Film]) -> AppResult<()> {
        if films.is_empty() {
            return Ok(());
        }
        let ids: Vec<i32> = films.iter().map(|f| f.film_id).collect();

        let (actors, categories) = futures::try_join!(
            self.bounded(self.store.query_film_actors(&ids)),
            self.bounded(self.store.query_film_categories(&ids)),
        )
        .map_err(|err| reported(err, "resolve film associations"))?;

        let mut actors = group_by_film(actors.into_iter().map(|a| (a.film_id, a.actor)));
        let mut categories =
            group_by_film(categories.into_iter().map(|c| (c.film_id, c.category)));

        for film in films.iter_mut() {
            film.actors = Some(actors.remove(&film.film_id).unwrap_or_default());
            film.categories = Some(categories.remove(&film.film_id).unwrap_or_default());
        }
        Ok(())
    }
}

pub fn group_by_film<T>(items: impl IntoIterator<Item = (i32, T)>) -> HashMap<i32, Vec<T>> {
    let mut grouped: HashMap<i32, Vec<T>> = HashMap::new();
    for (film_id, item) in items {
        grouped.entry(film_id).or_default().push(item);
    }
    grouped
}

/// Logs the backend failure once and hides it behind [`CatalogError::Internal`].
fn reported(err: StoreError, operation: &'static str) -> CatalogError {
    error!(error = %err, operation, "store read failed");
    CatalogError::Internal
}
