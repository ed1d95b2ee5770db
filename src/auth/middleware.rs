//! Session middleware
//!
//! The session stage wraps every handler:
//! - before the handler: verify the `session` cookie and expose the result
//!   as a [`SessionContext`] request extension
//! - after the handler: turn a [`SessionUpdate`] response extension into a
//!   `Set-Cookie` header
//!
//! Handlers never touch the session cookie directly.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::identity::{Identity, reconstitute};
use super::oauth::login_redirect;
use super::session::{SESSION_COOKIE, Session, create_session_token, verify_session_token};
use crate::AppState;
use crate::error::AppError;

/// Session verified by the session stage for the current request
#[derive(Debug, Clone, Default)]
pub struct SessionContext(pub Option<Session>);

/// Change to the session requested by a handler
///
/// Return it as `Extension(SessionUpdate::Set(..))` alongside the response.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Set(Session),
    Clear,
}

/// Session stage
///
/// # Usage
/// ```ignore
/// let app = Router::new()
///     .route("/", get(home))
///     .layer(middleware::from_fn_with_state(state.clone(), session_stage));
/// ```
pub async fn session_stage(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let secret = &state.config.auth.session_secret;

    let (session, rejected) = match jar.get(SESSION_COOKIE) {
        Some(cookie) => match verify_session_token(cookie.value(), secret) {
            Ok(session) => (Some(session), false),
            Err(error) => {
                tracing::debug!(%error, "Ignoring invalid session cookie");
                (None, true)
            }
        },
        None => (None, false),
    };

    request.extensions_mut().insert(SessionContext(session));

    let mut response = next.run(request).await;

    let cookie = match response.extensions_mut().remove::<SessionUpdate>() {
        Some(SessionUpdate::Set(session)) => match create_session_token(&session, secret) {
            Ok(token) => build_session_cookie(
                token,
                state.config.auth.session_max_age,
                state.config.should_use_secure_cookies(),
            ),
            Err(error) => return error.into_response(),
        },
        Some(SessionUpdate::Clear) => clear_session_cookie(),
        None if rejected => clear_session_cookie(),
        None => return response,
    };

    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
            response
        }
        Err(error) => AppError::Internal(error.into()).into_response(),
    }
}

fn build_session_cookie(token: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}

fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").http_only(true).build();
    cookie.make_removal();
    cookie
}

/// Session for a request, from the session stage or straight from the cookie
/// when the route is not behind the stage.
fn session_from_parts(parts: &Parts, state: &AppState) -> Option<Session> {
    if let Some(SessionContext(session)) = parts.extensions.get::<SessionContext>() {
        return session.clone();
    }

    session_from_headers(&parts.headers, &state.config.auth.session_secret)
}

fn session_from_headers(headers: &HeaderMap, secret: &str) -> Option<Session> {
    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(SESSION_COOKIE)?;
    verify_session_token(cookie.value(), secret).ok()
}

/// Extractor for current authenticated user
///
/// Requests without a valid session are redirected to the login page.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(identity): CurrentUser) -> impl IntoResponse {
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        match session_from_parts(parts, &state) {
            Some(session) => Ok(CurrentUser(reconstitute(&session))),
            None => Err(login_redirect(
                &state.config.auth.failure_redirect,
                "login_required",
            )),
        }
    }
}

/// Optional current user extractor
///
/// Returns None if not authenticated, instead of error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let session = session_from_parts(parts, &state);

        Ok(MaybeUser(session.as_ref().map(reconstitute)))
    }
}
