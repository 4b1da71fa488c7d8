//! Router wiring (spec.md §6).

use super::handlers;
use super::rate_limit::{rate_limit_middleware, RateLimiters};
use crate::config::Config;
use crate::engine::AuthorizationEngine;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuthorizationEngine>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Base URL the frontend SPA is served from. Out of scope for this
    /// crate (spec.md §1 Non-goals), so this just assumes it is co-hosted
    /// under the same origin as the API.
    pub fn frontend_base_url(&self) -> String {
        self.config.issuer()
    }
}

pub fn build_router(state: AppState) -> Router {
    let rate_limiters = RateLimiters::new();

    Router::new()
        .route("/auth", get(handlers::get_auth).post(handlers::post_auth))
        .route("/select-provider", post(handlers::post_select_provider))
        .route("/consent", post(handlers::post_consent))
        .route("/token", post(handlers::post_token))
        .route("/token/revoke", post(handlers::post_revoke))
        .route("/token/introspect", post(handlers::post_introspect))
        .route("/.well-known/oauth-authorization-server", get(handlers::get_metadata))
        .route("/callback/:provider_type", get(handlers::get_provider_callback))
        .route("/healthz", get(handlers::get_healthz))
        .layer(middleware::from_fn_with_state(rate_limiters.clone(), rate_limit_middleware))
        .with_state(state)
}
