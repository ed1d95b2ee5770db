//! Error pages
//!
//! - router fallback normalizing unmatched routes to a 404 `AppError`
//! - development-only stage that adds error detail to error bodies
//! - panic handler rendering uncaught failures as a 500 `AppError`

use std::any::Any;

use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::error::{AppError, ErrorDetail};

/// Fallback for unmatched routes
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Error-detail stage
///
/// In development, error responses are rewritten to carry the full error
/// text under `"detail"`. In production they pass through untouched.
pub async fn expose_error_detail(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    if !state.config.server.environment.is_development() {
        return response;
    }

    let Some(detail) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let status = response.status();
    let mut rewritten = (
        status,
        Json(serde_json::json!({
            "status": status.as_u16(),
            "error": detail.message,
            "detail": detail.detail,
        })),
    )
        .into_response();

    // Keep cookie changes made by inner stages.
    for value in response.headers().get_all(axum::http::header::SET_COOKIE) {
        rewritten
            .headers_mut()
            .append(axum::http::header::SET_COOKIE, value.clone());
    }
    rewritten
}

/// Render a caught panic as an internal error
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(anyhow::anyhow!("handler panicked: {message}")).into_response()
}
