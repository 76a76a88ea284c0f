//! Parameterized `SELECT` construction for the catalog tables.
//!
//! Table and column names are `&'static str` so only identifiers compiled into the
//! binary ever reach the statement text; every caller-supplied value is bound
//! through a `?` placeholder, in the order the placeholders appear.

use std::fmt::Write as _;

use sea_orm::{DbBackend, Value};

use crate::models::FilmQuery;

const FILM_COLUMNS: &[Column] = &[
    Column::new("film.film_id", Cast::Signed),
    Column::new("film.title", Cast::None),
    Column::new("film.description", Cast::None),
    Column::new("film.release_year", Cast::Signed),
    Column::new("film.language_id", Cast::Signed),
    Column::new("film.original_language_id", Cast::Signed),
    Column::new("film.rental_duration", Cast::Signed),
    Column::new("film.rental_rate", Cast::None),
    Column::new("film.length", Cast::Signed),
    Column::new("film.replacement_cost", Cast::None),
    Column::new("film.rating", Cast::Text),
    Column::new("film.special_features", Cast::Text),
    Column::new("film.last_update", Cast::DateTime),
];

const FILM_ACTOR_COLUMNS: &[Column] = &[
    Column::new("film_actor.film_id", Cast::Signed),
    Column::new("actor.actor_id", Cast::Signed),
    Column::new("actor.first_name", Cast::None),
    Column::new("actor.last_name", Cast::None),
    Column::new("actor.last_update", Cast::DateTime),
];

const FILM_CATEGORY_COLUMNS: &[Column] = &[
    Column::new("film_category.film_id", Cast::Signed),
    Column::new("category.category_id", Cast::Signed),
    Column::new("category.name", Cast::None),
    Column::new("category.last_update", Cast::DateTime),
];

/// SQL flavour a statement is rendered for. Both use `?` placeholders.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl From<DbBackend> for Dialect {
    fn from(backend: DbBackend) -> Self {
        match backend {
            DbBackend::MySql => Dialect::MySql,
            _ => Dialect::Sqlite,
        }
    }
}

/// Conversion applied on MySQL so unsigned, `YEAR`, `ENUM`/`SET` and `TIMESTAMP`
/// columns decode as signed integers, text and `DATETIME`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cast {
    None,
    Signed,
    Text,
    DateTime,
}

/// A selected column, `table.name`, read back under `name`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Column {
    expr: &'static str,
    cast: Cast,
}

impl Column {
    pub const fn new(expr: &'static str, cast: Cast) -> Self {
        Self { expr, cast }
    }

    fn alias(&self) -> &'static str {
        self.expr.rsplit('.').next().unwrap_or(self.expr)
    }

    fn render(&self, dialect: Dialect, sql: &mut String) {
        let target = match (dialect, self.cast) {
            (Dialect::Sqlite, _) | (_, Cast::None) => {
                sql.push_str(self.expr);
                return;
            },
            (Dialect::MySql, Cast::Signed) => "SIGNED",
            (Dialect::MySql, Cast::Text) => "CHAR",
            (Dialect::MySql, Cast::DateTime) => "DATETIME",
        };
        let _ = write!(sql, "CAST({} AS {target}) AS {}", self.expr, self.alias());
    }
}

/// Rendered statement text plus its bound values.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

/// One chain of `INNER JOIN` hops added for a single filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    hops: Vec<(&'static str, &'static str)>,
}

impl Join {
    pub fn inner(table: &'static str, on: &'static str) -> Self {
        Self { hops: vec![(table, on)] }
    }

    pub fn then(mut self, table: &'static str, on: &'static str) -> Self {
        self.hops.push((table, on));
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Predicate {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
}

/// Backend-neutral description of a select: target, columns, joins, predicates,
/// ordering and paging. Rendering is a pure function of this value.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectStatement {
    table: &'static str,
    columns: Vec<Column>,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    order_by: Vec<&'static str>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl SelectStatement {
    pub fn new(table: &'static str, columns: &[Column]) -> Self {
        Self {
            table,
            columns: columns.to_vec(),
            joins: Vec::new(),
            predicates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn where_eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq(column, value.into()));
        self
    }

    pub fn where_in<V: Into<Value>>(
        mut self,
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.predicates.push(Predicate::In(column, values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn order_by(mut self, column: &'static str) -> Self {
        self.order_by.push(column);
        self
    }

    /// Ignored unless positive.
    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit.filter(|l| *l > 0);
        self
    }

    /// Ignored unless positive.
    pub fn offset(mut self, offset: Option<u32>) -> Self {
        self.offset = offset.filter(|o| *o > 0);
        self
    }

    #[cfg(test)]
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn build(&self, dialect: Dialect) -> BuiltQuery {
        let mut sql = String::with_capacity(256);
        let mut values = Vec::new();

        sql.push_str("SELECT ");
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            column.render(dialect, &mut sql);
        }
        sql.push_str(" FROM ");
        sql.push_str(self.table);

        for join in &self.joins {
            for (table, on) in &join.hops {
                sql.push_str(" INNER JOIN ");
                sql.push_str(table);
                sql.push_str(" ON ");
                sql.push_str(on);
            }
        }

        for (i, predicate) in self.predicates.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            match predicate {
                Predicate::Eq(column, value) => {
                    sql.push_str(column);
                    sql.push_str(" = ?");
                    values.push(value.clone());
                },
                Predicate::In(_, set) if set.is_empty() => {
                    // an empty set matches nothing; `IN ()` is not valid SQL
                    sql.push_str("1 = 0");
                },
                Predicate::In(column, set) => {
                    sql.push_str(column);
                    sql.push_str(" IN (");
                    sql.push_str(&vec!["?"; set.len()].join(", "));
                    sql.push(')');
                    values.extend(set.iter().cloned());
                },
            }
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        // OFFSET is only valid after a LIMIT in both MySQL and SQLite.
        let limit = match (self.limit, self.offset) {
            (None, Some(_)) => Some(u32::MAX),
            (limit, _) => limit,
        };
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::from(i64::from(limit)));
        }
        if let Some(offset) = self.offset {
            sql.push_str(" OFFSET ?");
            values.push(Value::from(i64::from(offset)));
        }

        BuiltQuery { sql, values }
    }
}

/// Film select for the given filters; always ordered by `film_id` for stable paging.
pub fn film_statement(query: &FilmQuery) -> SelectStatement {
    let mut stmt = SelectStatement::new("film", FILM_COLUMNS);

    if let Some(category) = &query.category {
        stmt = stmt
            .join(
                Join::inner("film_category", "film_category.film_id = film.film_id")
                    .then("category", "category.category_id = film_category.category_id"),
            )
            .where_eq("category.name", category.clone());
    }

    if !query.film_ids.is_empty() {
        stmt = stmt.where_in("film.film_id", query.film_ids.iter().copied());
    }

    stmt.order_by("film.film_id").limit(query.limit).offset(query.offset)
}

pub fn film_actors_statement(film_ids: &[i32]) -> SelectStatement {
    SelectStatement::new("actor", FILM_ACTOR_COLUMNS)
        .join(Join::inner("film_actor", "film_actor.actor_id = actor.actor_id"))
        .where_in("film_actor.film_id", film_ids.iter().copied())
        .order_by("film_actor.film_id")
        .order_by("actor.actor_id")
}

pub fn film_categories_statement(film_ids: &[i32]) -> SelectStatement {
    SelectStatement::new("category", FILM_CATEGORY_COLUMNS)
        .join(Join::inner("film_category", "film_category.category_id = category.category_id"))
        .where_in("film_category.film_id", film_ids.iter().copied())
        .order_by("film_category.film_id")
        .order_by("category.category_id")
}
