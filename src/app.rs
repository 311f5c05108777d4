use crate::{api, storage::Store};
use axum::{Router, routing::any};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub url_prefix: String,
    pub max_body_size: usize,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(any(api::dispatch))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
