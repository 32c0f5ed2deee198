use crate::orchestrator::Orchestrator;
use axum::{routing::get, Router};
use std::sync::Arc;

pub mod market;

#[derive(serde::Serialize)]
#[serde(untagged)]
pub enum Response<T> {
    Success(T),
    Error(&'static str),
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/quote/{symbol}", get(market::quote))
        .route("/series/{symbol}", get(market::series))
        .route("/search", get(market::search))
        .with_state(orchestrator)
}
