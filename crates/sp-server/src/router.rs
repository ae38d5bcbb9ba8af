//! Router configuration.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home).post(handlers::home_post))
        .route("/login", get(handlers::login))
        .route("/callback", axum::routing::post(handlers::callback))
        .route("/logout", get(handlers::logout).post(handlers::logout))
        .route(
            "/simple-logout",
            get(handlers::simple_logout).post(handlers::simple_logout),
        )
        .route(
            "/cross-sp-logout",
            get(handlers::cross_sp_logout).post(handlers::cross_sp_logout),
        )
        .route("/sls", get(handlers::sls_redirect).post(handlers::sls_post))
        .route("/metadata", get(handlers::metadata))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
