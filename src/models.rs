use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Row limit applied to list queries that do not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub film_id: i32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    pub language_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language_id: Option<i32>,
    pub rental_duration: i32,
    pub rental_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i32>,
    pub replacement_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_features: Vec<String>,
    /// Populated on demand; `None` means associations were not resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actors: Option<Vec<Actor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    pub last_update: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub actor_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub last_update: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub category_id: i32,
    pub name: String,
    pub last_update: Timestamp,
}

/// An actor tagged with the film it was resolved for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmActor {
    pub film_id: i32,
    #[serde(flatten)]
    pub actor: Actor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmCategory {
    pub film_id: i32,
    #[serde(flatten)]
    pub category: Category,
}

/// Recognized film filters. Absent fields mean "no constraint".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilmQuery {
    pub film_ids: Vec<i32>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub category: Option<String>,
}

impl FilmQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_film_ids(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.film_ids.extend(ids);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Canonical form used for both statements and cache keys.
    ///
    /// A missing or zero limit becomes [`DEFAULT_LIMIT`], a zero offset is dropped and
    /// film IDs are sorted and deduplicated, so logically identical queries compare equal.
    pub fn normalized(&self) -> Self {
        Self {
            film_ids: sorted_ids(&self.film_ids),
            limit: Some(self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT)),
            offset: self.offset.filter(|o| *o > 0),
            category: self.category.clone(),
        }
    }
}

pub fn sorted_ids(ids: &[i32]) -> Vec<i32> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}
