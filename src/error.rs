//! Error types for lunch-login
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Authentication failures on the login flow never reach `IntoResponse`
/// directly; the callback handler recovers them into a redirect. The
/// variants still render sensibly if another handler propagates them.
#[derive(Debug, Error)]
pub enum AppError {
    /// Returned `state` did not match the issued one (403)
    #[error("OAuth state mismatch")]
    AuthCsrf,

    /// Provider reported an error on the callback, e.g. `access_denied` (403)
    #[error("Provider denied authorization: {0}")]
    AuthDenied(String),

    /// Token exchange or profile fetch failed or timed out (502)
    #[error("OAuth exchange failed: {0}")]
    AuthExchangeFailed(String),

    /// Session cookie missing, unsigned, expired or corrupt (401)
    #[error("Invalid session")]
    InvalidSession,

    /// Route or resource not found (404)
    #[error("Not Found")]
    NotFound,

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Short machine-readable name, used as the error indicator on
    /// login redirects and as the metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthCsrf => "csrf",
            AppError::AuthDenied(_) => "access_denied",
            AppError::AuthExchangeFailed(_) => "exchange_failed",
            AppError::InvalidSession => "invalid_session",
            AppError::NotFound => "not_found",
            AppError::HttpClient(_) => "http_client",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthCsrf | AppError::AuthDenied(_) => StatusCode::FORBIDDEN,
            AppError::InvalidSession => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::AuthExchangeFailed(_) | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Encryption(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message that is safe to show to any client
    fn public_message(&self) -> String {
        match self {
            AppError::AuthExchangeFailed(_) => "OAuth exchange failed".to_string(),
            AppError::AuthDenied(_) => "Provider denied authorization".to_string(),
            AppError::HttpClient(_) => "Upstream request failed".to_string(),
            AppError::Config(_) | AppError::Encryption(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Full error text, attached to error responses as an extension.
///
/// Only the development error-detail stage ever copies it into a body.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Body is `{"status": <code>, "error": <public message>}`.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let message = self.public_message();

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = Json(serde_json::json!({
            "status": status.as_u16(),
            "error": message,
        }));

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(ErrorDetail {
            message,
            detail: format!("{self:?}"),
        });
        response
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
