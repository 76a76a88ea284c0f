//! Per-request batch loaders for film associations.
//!
//! Field resolvers call `load_one(film_id)`; the `DataLoader` collects every key
//! requested before the executor yields and hands the distinct set to one
//! batched service call. A loader is built per request and has no cache of
//! its own, so nothing survives across requests.

use std::collections::HashMap;

use async_graphql::dataloader::{DataLoader, Loader};

use crate::{
    error::CatalogError,
    models::{Actor, Category},
    service::{CatalogService, group_by_film},
};

pub struct FilmActorsLoader {
    catalog: CatalogService,
}

impl FilmActorsLoader {
    pub fn new(catalog: CatalogService) -> Self {
        Self { catalog }
    }
}

impl Loader<i32> for FilmActorsLoader {
    type Value = Vec<Actor>;
    type Error = CatalogError;

    async fn load(&self, keys: &[i32]) -> Result<HashMap<i32, Self::Value>, Self::Error> {
        let actors = self.catalog.get_film_actors(keys).await?;
        Ok(fulfil(keys, actors.into_iter().map(|a| (a.film_id, a.actor))))
    }
}

pub struct FilmCategoriesLoader {
    catalog: CatalogService,
}

impl FilmCategoriesLoader {
    pub fn new(catalog: CatalogService) -> Self {
        Self { catalog }
    }
}

impl Loader<i32> for FilmCategoriesLoader {
    type Value = Vec<Category>;
    type Error = CatalogError;

    async fn load(&self, keys: &[i32]) -> Result<HashMap<i32, Self::Value>, Self::Error> {
        let categories = self.catalog.get_film_categories(keys).await?;
        Ok(fulfil(keys, categories.into_iter().map(|c| (c.film_id, c.category))))
    }
}

/// Every requested key gets an entry; a film with no associations maps to an empty list.
fn fulfil<T>(keys: &[i32], items: impl IntoIterator<Item = (i32, T)>) -> HashMap<i32, Vec<T>> {
    let mut grouped = group_by_film(items);
    for key in keys {
        grouped.entry(*key).or_default();
    }
    grouped
}

/// Fresh loaders for one request execution.
pub struct RequestLoaders {
    pub actors: DataLoader<FilmActorsLoader>,
    pub categories: DataLoader<FilmCategoriesLoader>,
}

impl RequestLoaders {
    pub fn new(catalog: &CatalogService) -> Self {
        Self {
            actors: DataLoader::new(FilmActorsLoader::new(catalog.clone()), tokio::spawn),
            categories: DataLoader::new(FilmCategoriesLoader::new(catalog.clone()), tokio::spawn),
        }
    }
}
