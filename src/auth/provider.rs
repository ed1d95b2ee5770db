//! OAuth provider strategies
//!
//! A strategy knows one provider's endpoints and response shapes. The
//! login flow only talks to the [`OAuthStrategy`] trait.

use std::time::{Duration, Instant};

use axum::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::GitHubOAuthConfig;
use crate::metrics::PROVIDER_REQUEST_DURATION_SECONDS;

/// Failure talking to the provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure or timeout
    #[error("{endpoint} request failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: u16,
    },

    /// 2xx response carrying an OAuth error body
    #[error("token endpoint rejected the code: {error}")]
    Rejected {
        error: String,
        description: Option<String>,
    },
}

/// Result of exchanging an authorization code
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// GitHub user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
    pub email: Option<String>,
}

/// Provider-specific half of the authorization-code flow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthStrategy: Send + Sync {
    /// Provider name, used in logs
    fn name(&self) -> &'static str;

    /// Authorization endpoint URL carrying `state`
    fn authorize_url(&self, state: &str) -> Url;

    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

    /// Fetch the profile of the token's owner
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, ProviderError>;
}

/// Token endpoint response
///
/// GitHub answers a bad code with HTTP 200 and an `error` field.
#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenEndpointResponse {
    fn into_grant(self) -> Result<TokenGrant, ProviderError> {
        match (self.access_token, self.error) {
            (Some(access_token), None) => Ok(TokenGrant {
                access_token,
                token_type: self.token_type,
                scope: self.scope,
                refresh_token: self.refresh_token,
            }),
            (_, error) => Err(ProviderError::Rejected {
                error: error.unwrap_or_else(|| "missing_access_token".to_string()),
                description: self.error_description,
            }),
        }
    }
}

/// GitHub OAuth App strategy
pub struct GitHubStrategy {
    config: GitHubOAuthConfig,
    authorize_url: Url,
    http_client: reqwest::Client,
}

impl GitHubStrategy {
    /// Build the strategy and its HTTP client
    ///
    /// Every outbound call is bounded by `timeout_seconds`.
    pub fn new(config: GitHubOAuthConfig) -> Result<Self, crate::error::AppError> {
        let authorize_url = Url::parse(&config.authorize_url).map_err(|e| {
            crate::error::AppError::Config(format!("auth.github.authorize_url: {e}"))
        })?;

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            authorize_url,
            http_client,
        })
    }
}

#[async_trait]
impl OAuthStrategy for GitHubStrategy {
    fn name(&self) -> &'static str {
        "github"
    }

    fn authorize_url(&self, state: &str) -> Url {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.callback_url);
            if let Some(scope) = &self.config.scope {
                query.append_pair("scope", scope);
            }
            query.append_pair("state", state);
        }
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        const ENDPOINT: &str = "token";

        let started = Instant::now();
        let result = self
            .http_client
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.config.callback_url.as_str()),
            ])
            .send()
            .await;
        PROVIDER_REQUEST_DURATION_SECONDS
            .with_label_values(&[ENDPOINT])
            .observe(started.elapsed().as_secs_f64());

        let response = result.map_err(|source| ProviderError::Http {
            endpoint: ENDPOINT,
            source,
        })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                endpoint: ENDPOINT,
                status: response.status().as_u16(),
            });
        }

        let body: TokenEndpointResponse =
            response.json().await.map_err(|source| ProviderError::Http {
                endpoint: ENDPOINT,
                source,
            })?;

        body.into_grant()
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, ProviderError> {
        const ENDPOINT: &str = "profile";

        let started = Instant::now();
        let result = self
            .http_client
            .get(&self.config.user_url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(access_token)
            .send()
            .await;
        PROVIDER_REQUEST_DURATION_SECONDS
            .with_label_values(&[ENDPOINT])
            .observe(started.elapsed().as_secs_f64());

        let response = result.map_err(|source| ProviderError::Http {
            endpoint: ENDPOINT,
            source,
        })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                endpoint: ENDPOINT,
                status: response.status().as_u16(),
            });
        }

        response.json().await.map_err(|source| ProviderError::Http {
            endpoint: ENDPOINT,
            source,
        })
    }
}
