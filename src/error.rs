use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Caller-visible failure of a catalog read. Carries no backend detail.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("not_found")]
    NotFound,
    #[error("internal")]
    Internal,
}

impl CatalogError {
    pub fn code(self) -> &'static str {
        match self {
            CatalogError::NotFound => "not_found",
            CatalogError::Internal => "internal",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            CatalogError::NotFound => "Film not found.",
            CatalogError::Internal => "Internal error.",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            CatalogError::NotFound => StatusCode::NOT_FOUND,
            CatalogError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: &'static str,
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: self.code(), message: self.message() };
        (self.status(), Json(body)).into_response()
    }
}

impl async_graphql::ErrorExtensions for CatalogError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.message()).extend_with(|_, e| {
            e.set("code", self.code().to_uppercase());
        })
    }
}

pub type AppResult<T> = Result<T, CatalogError>;
