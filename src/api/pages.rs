//! Home page and account endpoints

use axum::{
    Json, Router,
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
};

use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser, Profile};
use crate::error::AppError;

/// Create page router
///
/// Routes:
/// - GET / - Home page
/// - GET /users/me - Profile of the signed-in user
/// - GET /health - Health check
pub fn pages_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/users/me", get(current_profile))
        .route("/health", get(health_check))
}

/// GET /
///
/// Shows whether a session is present. Never contacts GitHub.
async fn home(MaybeUser(identity): MaybeUser) -> impl IntoResponse {
    let body = match identity {
        Some(_) => {
            r#"<p>You are signed in with GitHub.</p>
    <p><a href="/users/me">View your GitHub profile</a></p>
    <form method="post" action="/logout"><button type="submit">Sign out</button></form>"#
        }
        None => r#"<p>You are not signed in.</p>
    <a href="/auth/github">Sign in with GitHub</a>"#,
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>lunch-login</title></head>
<body>
    <h1>lunch-login</h1>
    {body}
</body>
</html>
"#
    ))
}

/// GET /users/me
///
/// The session only stores the access token, so the profile is fetched
/// from GitHub again on every call.
async fn current_profile(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .strategy
        .fetch_profile(&identity.access_token)
        .await
        .map_err(|e| AppError::AuthExchangeFailed(e.to_string()))?;

    Ok(Json(profile))
}

async fn health_check() -> &'static str {
    "OK"
}
