// src/routes.rs
use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::PollEngine;
use crate::handlers;
use crate::store::Store;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: PollEngine,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(engine: PollEngine) -> Self {
        let store = Arc::clone(engine.store());
        Self { engine, store }
    }
}

pub fn create_routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/register", post(handlers::register))
        .route("/me", get(handlers::current_user))
        .route("/polls", get(handlers::list_polls).post(handlers::create_poll))
        .route(
            "/polls/{id}",
            put(handlers::update_poll).delete(handlers::delete_poll),
        )
        .route("/polls/{id}/vote", post(handlers::vote))
        .route("/polls/{id}/results", get(handlers::results));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
