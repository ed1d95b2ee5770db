//! Common test utilities for E2E tests

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lunch_login::{AppState, config};
use tokio::net::TcpListener;

pub const CALLBACK_URL: &str = "http://localhost/auth/github/callback";
pub const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const SESSION_SECRET: &str = "test-secret-key-32-bytes-long!!!";
pub const GOOD_CODE: &str = "good-code";
pub const ACCESS_TOKEN: &str = "gho_test_token";

/// How the fake GitHub answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBehavior {
    Ok,
    TokenServerError,
    TokenRejected,
    ProfileUnauthorized,
    SlowToken,
}

#[derive(Clone)]
struct FakeGitHub {
    behavior: ProviderBehavior,
    token_calls: Arc<AtomicUsize>,
    profile_calls: Arc<AtomicUsize>,
}

async fn fake_access_token(
    State(fake): State<FakeGitHub>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    fake.token_calls.fetch_add(1, Ordering::SeqCst);

    match fake.behavior {
        ProviderBehavior::TokenServerError => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
        }
        ProviderBehavior::TokenRejected => {
            return Json(serde_json::json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            }))
            .into_response();
        }
        ProviderBehavior::SlowToken => {
            tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        }
        ProviderBehavior::Ok | ProviderBehavior::ProfileUnauthorized => {}
    }

    let valid = form.get("code").map(String::as_str) == Some(GOOD_CODE)
        && form.get("client_id").map(String::as_str) == Some("test-client-id")
        && form.get("client_secret").map(String::as_str) == Some("test-client-secret")
        && form.get("redirect_uri").map(String::as_str) == Some(CALLBACK_URL);
    if !valid {
        return Json(serde_json::json!({ "error": "bad_verification_code" })).into_response();
    }

    Json(serde_json::json!({
        "access_token": ACCESS_TOKEN,
        "token_type": "bearer",
        "scope": ""
    }))
    .into_response()
}

async fn fake_user(State(fake): State<FakeGitHub>, headers: HeaderMap) -> Response {
    fake.profile_calls.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {ACCESS_TOKEN}");
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str());
    let has_user_agent = headers.contains_key("user-agent");

    if fake.behavior == ProviderBehavior::ProfileUnauthorized || !authorized || !has_user_agent {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "message": "Bad credentials" })),
        )
            .into_response();
    }

    Json(serde_json::json!({
        "id": 583231,
        "login": "octocat",
        "name": "The Octocat",
        "avatar_url": "https://avatars.githubusercontent.com/u/583231",
        "html_url": "https://github.com/octocat",
        "email": null,
        "public_repos": 8
    }))
    .into_response()
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
    token_calls: Arc<AtomicUsize>,
    profile_calls: Arc<AtomicUsize>,
}

impl TestServer {
    /// Create a new test server instance backed by a well-behaved fake GitHub
    pub async fn new() -> Self {
        Self::with_options(ProviderBehavior::Ok, config::Environment::Production).await
    }

    pub async fn with_provider(behavior: ProviderBehavior) -> Self {
        Self::with_options(behavior, config::Environment::Production).await
    }

    pub async fn with_options(
        behavior: ProviderBehavior,
        environment: config::Environment,
    ) -> Self {
        let fake = FakeGitHub {
            behavior,
            token_calls: Arc::new(AtomicUsize::new(0)),
            profile_calls: Arc::new(AtomicUsize::new(0)),
        };
        let provider_addr = spawn(
            Router::new()
                .route("/login/oauth/access_token", post(fake_access_token))
                .route("/user", get(fake_user))
                .with_state(fake.clone()),
        )
        .await;

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                environment,
            },
            auth: config::AuthConfig {
                session_secret: SESSION_SECRET.to_string(),
                session_max_age: 604800,
                success_redirect: "/".to_string(),
                failure_redirect: "/login".to_string(),
                github: config::GitHubOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    callback_url: CALLBACK_URL.to_string(),
                    user_agent: "lunch-login-tests".to_string(),
                    authorize_url: AUTHORIZE_URL.to_string(),
                    token_url: format!("{provider_addr}/login/oauth/access_token"),
                    user_url: format!("{provider_addr}/user"),
                    scope: None,
                    timeout_seconds: 1,
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).unwrap();

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let addr = spawn(lunch_login::build_router(state.clone())).await;

        Self {
            addr,
            state,
            client,
            token_calls: fake.token_calls,
            profile_calls: fake.profile_calls,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    /// Hit `/auth/github` and return the issued state and the `oauth_state` cookie pair
    pub async fn start_login(&self) -> (String, String) {
        let response = self
            .client
            .get(self.url("/auth/github"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 302);

        let location = location(&response);
        let state = url::Url::parse(&location)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("state query parameter");
        let cookie = cookie_pair(&response, "oauth_state").expect("oauth_state cookie");

        (state, cookie)
    }

    /// Call the OAuth callback, optionally presenting the state cookie
    pub async fn callback(
        &self,
        code: &str,
        state: &str,
        state_cookie: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .get(self.url("/auth/github/callback"))
            .query(&[("code", code), ("state", state)]);
        if let Some(cookie) = state_cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.unwrap()
    }

    /// Full successful login; returns the `session=...` cookie pair
    pub async fn login(&self) -> String {
        let (state, state_cookie) = self.start_login().await;
        let response = self.callback(GOOD_CODE, &state, Some(&state_cookie)).await;
        assert_eq!(location(&response), "/");
        cookie_pair(&response, "session").expect("session cookie")
    }
}

async fn spawn(app: Router) -> String {
    // Bind to random port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .expect("location header")
        .to_string()
}

/// `name=value` of the first `Set-Cookie` header for `name`
pub fn cookie_pair(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| {
            pair.split_once('=')
                .is_some_and(|(cookie_name, _)| cookie_name.trim() == name)
        })
        .map(|pair| pair.trim().to_string())
}
