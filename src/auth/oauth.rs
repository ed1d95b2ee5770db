//! GitHub OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub.

use axum::{
    Extension, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::identity::{ExternalIdentity, project};
use super::middleware::SessionUpdate;
use super::provider::OAuthStrategy;
use super::session::{Session, decode_signed, encode_signed};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::LOGIN_ATTEMPTS_TOTAL;

const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_PATH: &str = "/auth/github";
const STATE_TTL_SECONDS: i64 = 600;

/// Create authentication router
///
/// Routes:
/// - GET /login - Login page
/// - GET /auth/github - Redirect to GitHub
/// - GET /auth/github/callback - OAuth callback
/// - POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/auth/github", get(github_redirect))
        .route("/auth/github/callback", get(github_callback))
        .route("/logout", post(logout))
}

// =============================================================================
// Login Page
// =============================================================================

#[derive(Debug, Deserialize)]
struct LoginQuery {
    error: Option<String>,
}

fn login_error_message(indicator: &str) -> String {
    match indicator {
        "csrf" => "Your sign-in request expired or did not match. Please try again.".to_string(),
        "exchange_failed" => "GitHub could not complete the sign-in. Please try again.".to_string(),
        "access_denied" => "GitHub sign-in was cancelled.".to_string(),
        "login_required" => "Please sign in to continue.".to_string(),
        other => format!("Sign-in failed ({}).", html_escape::encode_text(other)),
    }
}

/// GET /login
///
/// Renders a simple login page with GitHub sign-in button.
async fn login_page(Query(query): Query<LoginQuery>) -> impl IntoResponse {
    let notice = query
        .error
        .as_deref()
        .map(|indicator| format!("<p class=\"error\">{}</p>", login_error_message(indicator)))
        .unwrap_or_default();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login - lunch-login</title></head>
<body>
    <h1>lunch-login</h1>
    {notice}
    <p>Please sign in with GitHub</p>
    <a href="/auth/github">Sign in with GitHub</a>
</body>
</html>
"#
    ))
}

// =============================================================================
// GitHub OAuth
// =============================================================================

/// Anti-forgery state issued with the authorization redirect
#[derive(Debug, Serialize, Deserialize)]
struct PendingLogin {
    state: String,
    expires_at: DateTime<Utc>,
}

/// GET /auth/github
///
/// Redirects user to GitHub authorization page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in a signed cookie
/// 3. Redirect to GitHub with response_type, client_id, redirect_uri, state
async fn github_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let csrf_state = generate_csrf_state();
    let pending = PendingLogin {
        state: csrf_state.clone(),
        expires_at: Utc::now() + Duration::seconds(STATE_TTL_SECONDS),
    };
    let cookie_value = encode_signed(&pending, &state.config.auth.session_secret)?;
    let jar = jar.add(build_state_cookie(
        cookie_value,
        state.config.should_use_secure_cookies(),
    ));

    let location = state.strategy.authorize_url(&csrf_state);
    tracing::debug!(provider = state.strategy.name(), "Redirecting to OAuth provider");

    Ok((jar, found(location.as_str())).into_response())
}

/// Query parameters from GitHub callback
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallbackQuery {
    /// Authorization code
    pub code: Option<String>,
    /// CSRF state token
    pub state: Option<String>,
    /// Set instead of `code` when the user declines
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /auth/github/callback
///
/// Handles OAuth callback from GitHub. The state cookie is consumed
/// whatever the outcome, so a callback URL cannot be replayed.
async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let auth = &state.config.auth;

    let expected_state = jar
        .get(STATE_COOKIE)
        .and_then(|cookie| read_pending_state(cookie.value(), &auth.session_secret));
    let jar = jar.add(clear_state_cookie());

    match complete_login(
        state.strategy.as_ref(),
        expected_state.as_deref(),
        &query,
        auth.session_max_age,
    )
    .await
    {
        Ok(session) => {
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
            tracing::info!(provider = state.strategy.name(), "Login completed");

            (
                jar,
                Extension(SessionUpdate::Set(session)),
                found(&auth.success_redirect),
            )
                .into_response()
        }
        Err(error) => {
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&[error.kind()]).inc();
            tracing::warn!(provider = state.strategy.name(), %error, "Login failed");

            (jar, login_redirect(&auth.failure_redirect, error.kind())).into_response()
        }
    }
}

/// Drive a callback to a session
///
/// # Steps
/// 1. Reject provider-reported errors
/// 2. Verify CSRF state (before contacting the provider)
/// 3. Exchange code for access token
/// 4. Fetch user profile with the token
/// 5. Project the result into a session
pub(crate) async fn complete_login(
    strategy: &dyn OAuthStrategy,
    expected_state: Option<&str>,
    query: &CallbackQuery,
    session_max_age: i64,
) -> Result<Session, AppError> {
    if let Some(error) = &query.error {
        tracing::warn!(
            error = %error,
            description = ?query.error_description,
            "OAuth provider returned an error"
        );
        return Err(AppError::AuthDenied(error.clone()));
    }

    let expected = expected_state.ok_or(AppError::AuthCsrf)?;
    let received = query.state.as_deref().ok_or(AppError::AuthCsrf)?;
    if received != expected {
        return Err(AppError::AuthCsrf);
    }

    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::AuthExchangeFailed("missing authorization code".to_string()))?;

    let grant = strategy
        .exchange_code(code)
        .await
        .map_err(|e| AppError::AuthExchangeFailed(e.to_string()))?;

    let profile = strategy
        .fetch_profile(&grant.access_token)
        .await
        .map_err(|e| AppError::AuthExchangeFailed(e.to_string()))?;

    project(&ExternalIdentity { grant, profile }, session_max_age)
}

// =============================================================================
// Logout
// =============================================================================

/// POST /logout
///
/// Clears session cookie and redirects to login.
async fn logout() -> impl IntoResponse {
    (Extension(SessionUpdate::Clear), found("/login"))
}

// =============================================================================
// Helpers
// =============================================================================

/// 302 Found with a `Location` header
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Redirect to the login page with an error indicator
pub(crate) fn login_redirect(failure_redirect: &str, indicator: &str) -> Response {
    let separator = if failure_redirect.contains('?') { '&' } else { '?' };
    found(&format!(
        "{}{}error={}",
        failure_redirect,
        separator,
        urlencoding::encode(indicator)
    ))
}

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// State carried by a valid, unexpired state cookie
fn read_pending_state(cookie_value: &str, secret: &str) -> Option<String> {
    match decode_signed::<PendingLogin>(cookie_value, secret) {
        Ok(pending) if pending.expires_at > Utc::now() => Some(pending.state),
        Ok(_) => {
            tracing::debug!("OAuth state cookie expired");
            None
        }
        Err(error) => {
            tracing::debug!(%error, "Ignoring invalid OAuth state cookie");
            None
        }
    }
}

fn build_state_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, value))
        .path(STATE_COOKIE_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(STATE_TTL_SECONDS))
        .build()
}

fn clear_state_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((STATE_COOKIE, ""))
        .path(STATE_COOKIE_PATH)
        .http_only(true)
        .build();
    cookie.make_removal();
    cookie
}
