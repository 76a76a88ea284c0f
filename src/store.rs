use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, Statement, prelude::Decimal,
};
use time::PrimitiveDateTime;

use crate::{
    models::{Actor, Category, Film, FilmActor, FilmCategory, FilmQuery},
    query::{self, BuiltQuery, Dialect, SelectStatement},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no rows")]
    NotFound,
    #[error("store query timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("row decode: {0}")]
    Decode(String),
}

/// Relational reads behind the catalog. Multi-row reads return an empty list,
/// never [`StoreError::NotFound`].
#[async_trait]
pub trait FilmStore: Send + Sync {
    async fn query_film(&self, film_id: i32) -> Result<Film, StoreError>;
    async fn query_films(&self, query: &FilmQuery) -> Result<Vec<Film>, StoreError>;
    async fn query_film_actors(&self, film_ids: &[i32]) -> Result<Vec<FilmActor>, StoreError>;
    async fn query_film_categories(
        &self,
        film_ids: &[i32],
    ) -> Result<Vec<FilmCategory>, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone, Debug)]
pub struct SqlFilmStore {
    db: DatabaseConnection,
}

impl SqlFilmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn statement(&self, select: SelectStatement) -> Statement {
        let backend = self.db.get_database_backend();
        let BuiltQuery { sql, values } = select.build(Dialect::from(backend));
        Statement::from_sql_and_values(backend, sql, values)
    }
}

#[async_trait]
impl FilmStore for SqlFilmStore {
    async fn query_film(&self, film_id: i32) -> Result<Film, StoreError> {
        let query = FilmQuery::new().with_film_ids([film_id]).with_limit(1);
        let stmt = self.statement(query::film_statement(&query));

        let row = FilmRow::find_by_statement(stmt).one(&self.db).await?;
        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn query_films(&self, query: &FilmQuery) -> Result<Vec<Film>, StoreError> {
        let stmt = self.statement(query::film_statement(query));

        let rows = FilmRow::find_by_statement(stmt).all(&self.db).await?;
        rows.into_iter().map(Film::try_from).collect()
    }

    async fn query_film_actors(&self, film_ids: &[i32]) -> Result<Vec<FilmActor>, StoreError> {
        if film_ids.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = self.statement(query::film_actors_statement(film_ids));

        let rows = FilmActorRow::find_by_statement(stmt).all(&self.db).await?;
        rows.into_iter().map(FilmActor::try_from).collect()
    }

    async fn query_film_categories(
        &self,
        film_ids: &[i32],
    ) -> Result<Vec<FilmCategory>, StoreError> {
        if film_ids.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = self.statement(query::film_categories_statement(film_ids));

        let rows = FilmCategoryRow::find_by_statement(stmt).all(&self.db).await?;
        rows.into_iter().map(FilmCategory::try_from).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.db.ping().await?)
    }
}

// Integer columns are read as i64: the MySQL statements cast unsigned and `YEAR`
// columns to SIGNED, and SQLite integers are 64-bit.
#[derive(Debug, FromQueryResult)]
struct FilmRow {
    film_id: i64,
    title: String,
    description: Option<String>,
    release_year: Option<i64>,
    language_id: i64,
    original_language_id: Option<i64>,
    rental_duration: i64,
    rental_rate: Decimal,
    length: Option<i64>,
    replacement_cost: Decimal,
    rating: Option<String>,
    special_features: Option<String>,
    last_update: PrimitiveDateTime,
}

#[derive(Debug, FromQueryResult)]
struct FilmActorRow {
    film_id: i64,
    actor_id: i64,
    first_name: String,
    last_name: String,
    last_update: PrimitiveDateTime,
}

#[derive(Debug, FromQueryResult)]
struct FilmCategoryRow {
    film_id: i64,
    category_id: i64,
    name: String,
    last_update: PrimitiveDateTime,
}

impl TryFrom<FilmRow> for Film {
    type Error = StoreError;

    fn try_from(row: FilmRow) -> Result<Self, Self::Error> {
        Ok(Film {
            film_id: int(row.film_id, "film_id")?,
            title: row.title,
            description: row.description,
            release_year: opt_int(row.release_year, "release_year")?,
            language_id: int(row.language_id, "language_id")?,
            original_language_id: opt_int(row.original_language_id, "original_language_id")?,
            rental_duration: int(row.rental_duration, "rental_duration")?,
            rental_rate: money(row.rental_rate)?,
            length: opt_int(row.length, "length")?,
            replacement_cost: money(row.replacement_cost)?,
            rating: row.rating,
            special_features: split_features(row.special_features.as_deref()),
            actors: None,
            categories: None,
            last_update: timestamp(row.last_update)?,
        })
    }
}

impl TryFrom<FilmActorRow> for FilmActor {
    type Error = StoreError;

    fn try_from(row: FilmActorRow) -> Result<Self, Self::Error> {
        Ok(FilmActor {
            film_id: int(row.film_id, "film_id")?,
            actor: Actor {
                actor_id: int(row.actor_id, "actor_id")?,
                first_name: row.first_name,
                last_name: row.last_name,
                last_update: timestamp(row.last_update)?,
            },
        })
    }
}

impl TryFrom<FilmCategoryRow> for FilmCategory {
    type Error = StoreError;

    fn try_from(row: FilmCategoryRow) -> Result<Self, Self::Error> {
        Ok(FilmCategory {
            film_id: int(row.film_id, "film_id")?,
            category: Category {
                category_id: int(row.category_id, "category_id")?,
                name: row.name,
                last_update: timestamp(row.last_update)?,
            },
        })
    }
}

/// `special_features` is one comma-joined column (a MySQL `SET` reads back the same way).
fn split_features(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',').map(str::trim).filter(|f| !f.is_empty()).map(str::to_string).collect()
    })
    .unwrap_or_default()
}

fn int(value: i64, column: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} {value} out of range")))
}

fn opt_int(value: Option<i64>, column: &str) -> Result<Option<i32>, StoreError> {
    value.map(|v| int(v, column)).transpose()
}

fn money(value: Decimal) -> Result<f64, StoreError> {
    value.to_string().parse().map_err(|e| StoreError::Decode(format!("decimal {value}: {e}")))
}

/// Store timestamps carry no zone and are written in UTC.
fn timestamp(value: PrimitiveDateTime) -> Result<jiff::Timestamp, StoreError> {
    jiff::Timestamp::from_second(value.assume_utc().unix_timestamp())
        .map_err(|e| StoreError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, ConnectionTrait, Database};

    use super::*;

    const FIXTURES: &str = "
        INSERT INTO film (film_id, title, description, release_year, language_id, rental_duration,
            rental_rate, length, replacement_cost, rating, special_features, last_update) VALUES
            (1, 'ACADEMY DINOSAUR', 'An Epic Drama', 2006, 1, 6, 0.99, 86, 20.99, 'PG',
                'Deleted Scenes,Behind the Scenes', '2006-02-15 05:03:42'),
            (2, 'ACE GOLDFINGER', NULL, 2006, 1, 3, 4.99, 48, 12.99, 'G', 'Trailers',
                '2006-02-15 05:03:42'),
            (3, 'ADAPTATION HOLES', NULL, NULL, 1, 7, 2.99, NULL, 18.99, NULL, NULL,
                '2006-02-15 05:03:42'),
            (4, 'AFFAIR PREJUDICE', NULL, 2006, 1, 5, 2.99, 117, 26.99, 'G', '',
                '2006-02-15 05:03:42');
        INSERT INTO actor (actor_id, first_name, last_name, last_update) VALUES
            (1, 'PENELOPE', 'GUINESS', '2006-02-15 04:34:33'),
            (2, 'NICK', 'WAHLBERG', '2006-02-15 04:34:33'),
            (3, 'ED', 'CHASE', '2006-02-15 04:34:33');
        INSERT INTO film_actor (actor_id, film_id, last_update) VALUES
            (1, 1, '2006-02-15 05:05:03'),
            (3, 1, '2006-02-15 05:05:03'),
            (2, 3, '2006-02-15 05:05:03'),
            (3, 3, '2006-02-15 05:05:03');
        INSERT INTO category (category_id, name, last_update) VALUES
            (1, 'Action', '2006-02-15 04:46:27'),
            (2, 'Drama', '2006-02-15 04:46:27');
        INSERT INTO film_category (film_id, category_id, last_update) VALUES
            (1, 2, '2006-02-15 05:07:09'),
            (2, 1, '2006-02-15 05:07:09'),
            (4, 2, '2006-02-15 05:07:09');
    ";

    async fn seeded_store() -> SqlFilmStore {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        for stmt in FIXTURES.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            db.execute_unprepared(stmt).await.unwrap();
        }
        SqlFilmStore::new(db)
    }

    #[tokio::test]
    async fn query_film_maps_optional_columns() {
        let store = seeded_store().await;

        let film = store.query_film(1).await.unwrap();
        assert_eq!(film.title, "ACADEMY DINOSAUR");
        assert_eq!(film.description.as_deref(), Some("An Epic Drama"));
        assert_eq!(film.rental_rate, 0.99);
        assert_eq!(film.special_features, vec!["Deleted Scenes", "Behind the Scenes"]);
        assert_eq!(film.last_update.as_second(), 1_139_979_822);
        assert!(film.actors.is_none());

        let sparse = store.query_film(3).await.unwrap();
        assert!(sparse.release_year.is_none());
        assert!(sparse.length.is_none());
        assert!(sparse.rating.is_none());
        assert!(sparse.special_features.is_empty());

        assert!(store.query_film(4).await.unwrap().special_features.is_empty());
    }

    #[tokio::test]
    async fn missing_film_is_not_found() {
        let store = seeded_store().await;
        assert!(matches!(store.query_film(999).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn query_films_pages_in_id_order() {
        let store = seeded_store().await;

        let ids = |films: Vec<Film>| films.into_iter().map(|f| f.film_id).collect::<Vec<_>>();

        let all = store.query_films(&FilmQuery::new().normalized()).await.unwrap();
        assert_eq!(ids(all), vec![1, 2, 3, 4]);

        let page = store.query_films(&FilmQuery::new().with_limit(2).with_offset(1)).await.unwrap();
        assert_eq!(ids(page), vec![2, 3]);

        let drama = store.query_films(&FilmQuery::new().with_category("Drama")).await.unwrap();
        assert_eq!(ids(drama), vec![1, 4]);

        let none = store.query_films(&FilmQuery::new().with_category("Horror")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn batch_associations_are_tagged_by_film() {
        let store = seeded_store().await;

        let actors = store.query_film_actors(&[1, 2, 3]).await.unwrap();
        let pairs: Vec<(i32, i32)> = actors.iter().map(|a| (a.film_id, a.actor.actor_id)).collect();
        assert_eq!(pairs, vec![(1, 1), (1, 3), (3, 2), (3, 3)]);
        assert_eq!(actors[0].actor.last_name, "GUINESS");

        let categories = store.query_film_categories(&[1, 2]).await.unwrap();
        let pairs: Vec<(i32, &str)> =
            categories.iter().map(|c| (c.film_id, c.category.name.as_str())).collect();
        assert_eq!(pairs, vec![(1, "Drama"), (2, "Action")]);

        assert!(store.query_film_actors(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn wide_integers_are_decode_errors() {
        assert_eq!(int(65_535, "film_id").unwrap(), 65_535);
        assert_eq!(opt_int(None, "length").unwrap(), None);
        assert!(matches!(int(i64::MAX, "film_id"), Err(StoreError::Decode(_))));
    }

    #[test]
    fn features_split_on_commas() {
        assert_eq!(split_features(Some("Trailers, Commentaries")), vec!["Trailers", "Commentaries"]);
        assert!(split_features(Some("")).is_empty());
        assert!(split_features(None).is_empty());
    }
}
