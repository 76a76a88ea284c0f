use std::{fmt::Write as _, sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    kv::{CacheError, KeyValueStore},
    models::{FilmQuery, sorted_ids},
};

/// Default lifetime of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default bound on a single cache round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maps entity fingerprints to JSON blobs in a [`KeyValueStore`].
#[derive(Clone)]
pub struct CacheManager {
    kv: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: Duration,
    timeout: Duration,
}

impl CacheManager {
    pub fn new(kv: Arc<dyn KeyValueStore>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self { kv, prefix: prefix.into(), ttl, timeout: DEFAULT_TIMEOUT }
    }

    /// Bounds every get and set; an elapsed call is [`CacheError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.bounded(self.kv.get(key)).await? {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let blob = serde_json::to_string(value)?;
        self.bounded(self.kv.set(key, blob, self.ttl)).await
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }

    pub fn film_key(&self, film_id: i32, bare: bool) -> String {
        let mut key = self.root("film");
        let _ = write!(key, "::id:{film_id}");
        if bare {
            key.push_str("::bare");
        }
        key
    }

    /// Expects a normalized query; `None` fields are left out of the key.
    pub fn films_key(&self, query: &FilmQuery, bare: bool) -> String {
        let mut key = self.root("films");
        if bare {
            key.push_str("::bare");
        }
        if !query.film_ids.is_empty() {
            key.push_str("::ids:");
            key.push_str(&join_ids(&query.film_ids));
        }
        if let Some(limit) = query.limit {
            let _ = write!(key, "::limit:{limit}");
        }
        if let Some(offset) = query.offset {
            let _ = write!(key, "::offset:{offset}");
        }
        if let Some(category) = &query.category {
            key.push_str("::category:");
            key.push_str(&urlencoding::encode(category));
        }
        key
    }

    pub fn film_actors_key(&self, film_ids: &[i32]) -> String {
        let mut key = self.root("film_actors");
        key.push_str("::film_id:");
        key.push_str(&join_ids(&sorted_ids(film_ids)));
        key
    }

    pub fn film_categories_key(&self, film_ids: &[i32]) -> String {
        let mut key = self.root("film_categories");
        key.push_str("::film_id:");
        key.push_str(&join_ids(&sorted_ids(film_ids)));
        key
    }

    fn root(&self, kind: &str) -> String {
        if self.prefix.is_empty() {
            kind.to_string()
        } else {
            format!("{}::{kind}", self.prefix)
        }
    }
}

fn join_ids(ids: &[i32]) -> String {
    ids.iter().map(i32::to_string).collect::<Vec<_>>().join(",")
}
