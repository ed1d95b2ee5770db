//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::net::IpAddr;
use url::Url;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3000)
    pub port: u16,
    /// Controls whether error responses carry internal detail
    #[serde(default)]
    pub environment: Environment,
}

/// Runtime environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session signing secret (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
    /// Where a completed login lands (default: "/")
    pub success_redirect: String,
    /// Where a failed login lands (default: "/login")
    pub failure_redirect: String,
    pub github: GitHubOAuthConfig,
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Absolute URL of `/auth/github/callback` as registered with GitHub
    pub callback_url: String,
    /// GitHub rejects API requests without a User-Agent
    pub user_agent: String,
    pub authorize_url: String,
    pub token_url: String,
    pub user_url: String,
    /// Requested scope; GitHub grants public read access when omitted
    pub scope: Option<String>,
    /// Bound on each outbound call to GitHub
    pub timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> String {
        format!("lunch_login={level},tower_http={level}", level = self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (LUNCH_LOGIN__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment as EnvSource, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.environment", "production")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("auth.success_redirect", "/")?
            .set_default("auth.failure_redirect", "/login")?
            .set_default("auth.github.user_agent", "lunch-login")?
            .set_default(
                "auth.github.authorize_url",
                "https://github.com/login/oauth/authorize",
            )?
            .set_default(
                "auth.github.token_url",
                "https://github.com/login/oauth/access_token",
            )?
            .set_default("auth.github.user_url", "https://api.github.com/user")?
            .set_default("auth.github.timeout_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (LUNCH_LOGIN__*)
            .add_source(
                EnvSource::with_prefix("LUNCH_LOGIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Cookies get the `Secure` attribute whenever GitHub calls us back over https.
    pub fn should_use_secure_cookies(&self) -> bool {
        Url::parse(&self.auth.github.callback_url)
            .map(|url| url.scheme() == "https")
            .unwrap_or(true)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;
        // Ten years
        const MAX_SESSION_MAX_AGE: i64 = 10 * 365 * 24 * 60 * 60;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 || self.auth.session_max_age > MAX_SESSION_MAX_AGE {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_max_age must be between 1 and {} seconds",
                MAX_SESSION_MAX_AGE
            )));
        }

        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {:?})",
                self.logging.level
            )));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\" (got {:?})",
                self.logging.format
            )));
        }

        let github = &self.auth.github;
        if github.client_id.trim().is_empty() || github.client_secret.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "auth.github.client_id and auth.github.client_secret are required".to_string(),
            ));
        }

        if github.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "auth.github.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for (key, value) in [
            ("auth.github.authorize_url", &github.authorize_url),
            ("auth.github.token_url", &github.token_url),
            ("auth.github.user_url", &github.user_url),
        ] {
            Url::parse(value).map_err(|e| {
                crate::error::AppError::Config(format!("{key} is not a valid URL: {e}"))
            })?;
        }

        let callback = Url::parse(&github.callback_url).map_err(|e| {
            crate::error::AppError::Config(format!(
                "auth.github.callback_url is not a valid URL: {e}"
            ))
        })?;
        let host = callback.host_str().unwrap_or_default();

        if callback.scheme() == "https" || is_local_host(host) {
            Ok(())
        } else {
            Err(crate::error::AppError::Config(
                "auth.github.callback_url must be https for non-local hosts".to_string(),
            ))
        }
    }
}

fn is_local_host(host: &str) -> bool {
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
