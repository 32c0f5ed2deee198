use super::Response;
use crate::data::{ChartSeries, SymbolQuote};
use crate::orchestrator::{DataSource, Orchestrator};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

pub const DATA_SOURCE_HEADER: &str = "x-data-source";

#[derive(Deserialize)]
pub struct SeriesParams {
    timeframe: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

fn source_header(source: &DataSource) -> [(HeaderName, HeaderValue); 1] {
    let value = HeaderValue::from_str(&source.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
    [(HeaderName::from_static(DATA_SOURCE_HEADER), value)]
}

pub async fn series(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(symbol): Path<String>,
    Query(params): Query<SeriesParams>,
) -> (
    StatusCode,
    [(HeaderName, HeaderValue); 1],
    Json<Response<ChartSeries>>,
) {
    // a missing timeframe resolves to the configured fallback
    let timeframe = params.timeframe.unwrap_or_default();
    let sourced = orchestrator.fetch_series(&symbol, &timeframe).await;

    (
        StatusCode::OK,
        source_header(&sourced.source),
        Json(Response::Success(sourced.value)),
    )
}

pub async fn quote(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(symbol): Path<String>,
) -> axum::response::Response {
    match orchestrator.fetch_quote(&symbol).await {
        Some(sourced) => (
            StatusCode::OK,
            source_header(&sourced.source),
            Json(Response::<SymbolQuote>::Success(sourced.value)),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Response::<SymbolQuote>::Error("Quote unavailable, retry later")),
        )
            .into_response(),
    }
}

pub async fn search(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(params): Query<SearchParams>,
) -> (StatusCode, Json<Response<Vec<SymbolQuote>>>) {
    let query = params.q.unwrap_or_default();
    let results = orchestrator.search(&query).await;
    (StatusCode::OK, Json(Response::Success(results)))
}
