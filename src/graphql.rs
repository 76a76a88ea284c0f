//! GraphQL schema over the catalog.
//!
//! Root fields read films with associations deferred; `actors` and `categories`
//! on each film go through the request's [`RequestLoaders`].

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Result as GqlResult,
    Schema, SimpleObject,
};

use crate::{
    loader::RequestLoaders,
    models::{Actor, Category, Film, FilmQuery},
    service::{Associations, CatalogService},
};

pub type CatalogSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

/// Builds one schema instance owning its service handle.
pub fn build_schema(catalog: CatalogService) -> CatalogSchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription).data(catalog).finish()
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Actor")]
pub struct GqlActor {
    pub actor_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub last_update: String,
}

impl From<Actor> for GqlActor {
    fn from(a: Actor) -> Self {
        Self {
            actor_id: a.actor_id,
            first_name: a.first_name,
            last_name: a.last_name,
            last_update: a.last_update.to_string(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Category")]
pub struct GqlCategory {
    pub category_id: i32,
    pub name: String,
    pub last_update: String,
}

impl From<Category> for GqlCategory {
    fn from(c: Category) -> Self {
        Self { category_id: c.category_id, name: c.name, last_update: c.last_update.to_string() }
    }
}

pub struct GqlFilm(Film);

#[Object(name = "Film")]
impl GqlFilm {
    async fn film_id(&self) -> i32 {
        self.0.film_id
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    async fn release_year(&self) -> Option<i32> {
        self.0.release_year
    }

    async fn language_id(&self) -> i32 {
        self.0.language_id
    }

    async fn original_language_id(&self) -> Option<i32> {
        self.0.original_language_id
    }

    async fn rental_duration(&self) -> i32 {
        self.0.rental_duration
    }

    async fn rental_rate(&self) -> f64 {
        self.0.rental_rate
    }

    async fn length(&self) -> Option<i32> {
        self.0.length
    }

    async fn replacement_cost(&self) -> f64 {
        self.0.replacement_cost
    }

    async fn rating(&self) -> Option<&str> {
        self.0.rating.as_deref()
    }

    async fn special_features(&self) -> Vec<String> {
        self.0.special_features.clone()
    }

    async fn last_update(&self) -> String {
        self.0.last_update.to_string()
    }

    async fn actors(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlActor>> {
        if let Some(actors) = &self.0.actors {
            return Ok(actors.iter().cloned().map(GqlActor::from).collect());
        }
        let loaders = ctx.data::<RequestLoaders>()?;
        let actors =
            loaders.actors.load_one(self.0.film_id).await.map_err(|e| e.extend())?;
        Ok(actors.unwrap_or_default().into_iter().map(GqlActor::from).collect())
    }

    async fn categories(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlCategory>> {
        if let Some(categories) = &self.0.categories {
            return Ok(categories.iter().cloned().map(GqlCategory::from).collect());
        }
        let loaders = ctx.data::<RequestLoaders>()?;
        let categories =
            loaders.categories.load_one(self.0.film_id).await.map_err(|e| e.extend())?;
        Ok(categories.unwrap_or_default().into_iter().map(GqlCategory::from).collect())
    }
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Returns the film with the given ID.
    async fn film(&self, ctx: &Context<'_>, film_id: i32) -> GqlResult<GqlFilm> {
        let catalog = ctx.data::<CatalogService>()?;
        let film = catalog
            .get_film_with(film_id, Associations::Deferred)
            .await
            .map_err(|e| e.extend())?;
        Ok(GqlFilm(film))
    }

    /// Returns the films for the given parameters.
    async fn films(
        &self,
        ctx: &Context<'_>,
        limit: Option<u32>,
        first: Option<u32>,
        offset: Option<u32>,
        after: Option<u32>,
        category: Option<String>,
    ) -> GqlResult<Vec<GqlFilm>> {
        let catalog = ctx.data::<CatalogService>()?;
        let query = FilmQuery {
            film_ids: Vec::new(),
            limit: limit.or(first),
            offset: offset.or(after),
            category,
        };
        let films = catalog
            .get_films_with(&query, Associations::Deferred)
            .await
            .map_err(|e| e.extend())?;
        Ok(films.into_iter().map(GqlFilm).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, atomic::Ordering};

    use async_graphql::Request;

    use super::*;
    use crate::testing::{StubStore, film_actor, film_category, memory_cache, service};

    fn catalog(store: Arc<StubStore>) -> CatalogService {
        service(store, memory_cache())
    }

    fn execute_request(query: &str, catalog: &CatalogService) -> Request {
        Request::new(query).data(RequestLoaders::new(catalog))
    }

    #[tokio::test]
    async fn nested_fields_batch_across_films() {
        let store = Arc::new(StubStore {
            actors: vec![film_actor(1, 10), film_actor(2, 20), film_actor(2, 21)],
            categories: vec![film_category(3, 4, "Horror")],
            ..StubStore::with_films(1..=3)
        });
        let catalog = catalog(store.clone());
        let schema = build_schema(catalog.clone());

        let resp = schema
            .execute(execute_request(
                "{ films(limit: 3) { filmId actors { actorId } categories { name } } }",
                &catalog,
            ))
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let data = resp.data.into_json().unwrap();
        assert_eq!(
            data,
            serde_json::json!({ "films": [
                { "filmId": 1, "actors": [{ "actorId": 10 }], "categories": [] },
                { "filmId": 2, "actors": [{ "actorId": 20 }, { "actorId": 21 }], "categories": [] },
                { "filmId": 3, "actors": [], "categories": [{ "name": "Horror" }] },
            ]})
        );
        assert_eq!(store.calls.actors.load(Ordering::SeqCst), 1);
        assert_eq!(store.calls.categories.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_film_reports_not_found_code() {
        let catalog = catalog(Arc::new(StubStore::default()));
        let schema = build_schema(catalog.clone());

        let resp =
            schema.execute(execute_request("{ film(filmId: 5) { title } }", &catalog)).await;
        assert_eq!(resp.errors.len(), 1);
        assert_eq!(resp.errors[0].message, "Film not found.");
        let code = resp.errors[0].extensions.as_ref().and_then(|ext| ext.get("code")).cloned();
        assert_eq!(code, Some(async_graphql::Value::from("NOT_FOUND")));
    }

    #[tokio::test]
    async fn paging_aliases_map_onto_the_query() {
        let store = Arc::new(StubStore::with_films(1..=10));
        let catalog = catalog(store.clone());
        let schema = build_schema(catalog.clone());

        let resp = schema
            .execute(execute_request("{ films(first: 2, after: 4) { filmId } }", &catalog))
            .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);

        let recorded = store.film_queries.lock().unwrap()[0].clone();
        assert_eq!(recorded.limit, Some(2));
        assert_eq!(recorded.offset, Some(4));
        assert_eq!(
            resp.data.into_json().unwrap(),
            serde_json::json!({ "films": [{ "filmId": 5 }, { "filmId": 6 }] })
        );
    }
}
