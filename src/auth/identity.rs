//! Identity projection
//!
//! Maps what the provider returned during the callback into the session
//! payload, and turns a verified session back into an identity.

use chrono::{Duration, Utc};

use super::provider::{Profile, TokenGrant};
use super::session::Session;
use crate::error::AppError;

/// Token and profile returned by the provider
///
/// Only lives inside the callback handler.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub grant: TokenGrant,
    pub profile: Profile,
}

/// Authenticated identity of the current request
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub access_token: String,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Project an external identity into a session
///
/// Only the access token is kept. Profile fields never reach the cookie.
///
/// # Errors
/// Returns `AppError::Internal` if `max_age_seconds` puts the expiry
/// outside the representable date range
pub fn project(identity: &ExternalIdentity, max_age_seconds: i64) -> Result<Session, AppError> {
    let now = Utc::now();
    let expires_at = Duration::try_seconds(max_age_seconds)
        .and_then(|max_age| now.checked_add_signed(max_age))
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "session max age of {max_age_seconds}s overflows the expiry date"
            ))
        })?;

    tracing::info!(
        github_id = identity.profile.id,
        github_login = %identity.profile.login,
        "Projecting provider identity into session"
    );

    Ok(Session {
        identity_token: identity.grant.access_token.clone(),
        issued_at: now,
        expires_at,
    })
}

/// Rebuild the identity from an already verified session
pub fn reconstitute(session: &Session) -> Identity {
    Identity {
        access_token: session.identity_token.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external_identity() -> ExternalIdentity {
        ExternalIdentity {
            grant: TokenGrant {
                access_token: "gho_abc123".to_string(),
                token_type: Some("bearer".to_string()),
                scope: Some(String::new()),
                refresh_token: None,
            },
            profile: Profile {
                id: 42,
                login: "octocat".to_string(),
                name: Some("The Octocat".to_string()),
                avatar_url: None,
                html_url: None,
                email: Some("octocat@example.com".to_string()),
            },
        }
    }

    #[test]
    fn project_keeps_only_the_token() {
        let session = project(&external_identity(), 3_600).unwrap();

        assert_eq!(session.identity_token, "gho_abc123");
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("octocat"));
    }

    #[test]
    fn project_sets_expiry_from_max_age() {
        let session = project(&external_identity(), 3_600).unwrap();

        assert_eq!((session.expires_at - session.issued_at).num_seconds(), 3_600);
        assert!(!session.is_expired());
    }

    #[test]
    fn project_rejects_max_age_past_the_date_range() {
        let result = project(&external_identity(), 10_000_000_000_000);
        assert!(matches!(result, Err(AppError::Internal(_))));

        let result = project(&external_identity(), i64::MAX);
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn reconstitute_returns_the_projected_token() {
        let session = project(&external_identity(), 3_600).unwrap();

        assert_eq!(
            reconstitute(&session),
            Identity {
                access_token: "gho_abc123".to_string()
            }
        );
    }

    #[test]
    fn identity_debug_redacts_token() {
        let identity = Identity {
            access_token: "gho_abc123".to_string(),
        };
        assert!(!format!("{identity:?}").contains("gho_abc123"));
    }
}
