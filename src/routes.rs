use std::{sync::Arc, time::Duration};

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderName, Request, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower::{Layer, ServiceBuilder};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    normalize_path::{NormalizePath, NormalizePathLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{OnResponse, TraceLayer},
};
use tracing::{Span, info, info_span};

use crate::{
    AppState,
    error::AppResult,
    loader::RequestLoaders,
    models::{Film, FilmQuery},
};

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/films", get(get_films))
        .route("/films/{id}", get(get_film))
        .route("/graphql", get(graphql_playground).post(graphql_handler))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Wraps the router in the request pipeline: panic recovery, request IDs,
/// per-request logging, deflate/gzip compression and CORS. Trailing slashes are
/// trimmed before routing.
pub fn with_middleware(router: Router) -> NormalizePath<Router> {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            let request_id =
                req.headers().get(&REQUEST_ID).and_then(|v| v.to_str().ok()).unwrap_or("-");
            info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                protocol = ?req.version(),
                request_id = %request_id,
            )
        })
        .on_response(LogResponse);

    let layered = router.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::new())
            .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
            .layer(trace)
            .layer(PropagateRequestIdLayer::new(REQUEST_ID))
            .layer(CompressionLayer::new())
            .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any)),
    );
    NormalizePathLayer::trim_trailing_slash().layer(layered)
}

/// One line per response: status, latency and body size when known.
#[derive(Clone, Copy, Debug)]
struct LogResponse;

impl<B> OnResponse<B> for LogResponse {
    fn on_response(self, res: &Response<B>, latency: Duration, _span: &Span) {
        let size = res
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        info!(
            status = res.status().as_u16(),
            response_time_ms = latency.as_millis() as u64,
            size,
            "request served"
        );
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FilmsParams {
    #[serde(alias = "first")]
    limit: Option<u32>,
    #[serde(alias = "after")]
    offset: Option<u32>,
    category: Option<String>,
}

impl From<FilmsParams> for FilmQuery {
    fn from(p: FilmsParams) -> Self {
        FilmQuery {
            film_ids: Vec::new(),
            limit: p.limit,
            offset: p.offset,
            category: p.category.filter(|c| !c.trim().is_empty()),
        }
    }
}

pub async fn get_films(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilmsParams>,
) -> AppResult<Json<Vec<Film>>> {
    let films = state.catalog.get_films(&params.into()).await?;
    Ok(Json(films))
}

pub async fn get_film(
    State(state): State<Arc<AppState>>,
    Path(film_id): Path<i32>,
) -> AppResult<Json<Film>> {
    let film = state.catalog.get_film(film_id).await?;
    Ok(Json(film))
}

pub async fn graphql_handler(
    State(state): State<Arc<AppState>>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let request = req.into_inner().data(RequestLoaders::new(&state.catalog));
    state.schema.execute(request).await.into()
}

pub async fn graphql_playground() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.health.latest();
    let status = if report.is_ok() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}
