//! lunch-login - GitHub OAuth login with a signed cookie session
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - Trace, panic catching, error detail                      │
//! │  - Session stage (read cookie before, write cookie after)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Handlers                                │
//! │  - /auth/github, /auth/github/callback, /logout, /login     │
//! │  - /, /users/me, /health, /metrics                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   OAuth strategy (GitHub)                    │
//! │  - token exchange, profile fetch                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: pages, error pages and metrics
//! - `auth`: OAuth flow, session codec, identity projection
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Read-only after startup; cloned for each request.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Provider adapter used by the login flow
    pub strategy: Arc<dyn auth::OAuthStrategy>,
}

impl AppState {
    /// Initialize application state with the GitHub strategy
    ///
    /// Expects a configuration already checked by `AppConfig::load`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let strategy = auth::GitHubStrategy::new(config.auth.github.clone())?;
        tracing::info!(
            callback_url = %config.auth.github.callback_url,
            "GitHub strategy initialized"
        );

        Ok(Self::with_strategy(config, Arc::new(strategy)))
    }

    /// Initialize application state with any provider strategy
    pub fn with_strategy(config: config::AppConfig, strategy: Arc<dyn auth::OAuthStrategy>) -> Self {
        Self {
            config: Arc::new(config),
            strategy,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    let routes = axum::Router::new()
        .merge(api::pages_router())
        .merge(auth::auth_router())
        .merge(api::metrics_router())
        .fallback(api::not_found);

    with_layers(routes, state)
}

/// Wrap routes in the request stages, outermost last
fn with_layers(routes: axum::Router<AppState>, state: AppState) -> axum::Router {
    use axum::middleware;
    use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

    routes
        .layer(CatchPanicLayer::custom(api::handle_panic))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_stage,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::expose_error_detail,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
