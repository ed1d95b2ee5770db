//! GitHub OAuth authentication
//!
//! Handles:
//! - GitHub OAuth flow
//! - Signed cookie sessions
//! - Identity projection
//! - Session middleware and extractors

pub mod identity;
mod middleware;
mod oauth;
pub mod provider;
pub mod session;

pub use identity::{ExternalIdentity, Identity, project, reconstitute};
pub use middleware::{CurrentUser, MaybeUser, SessionContext, SessionUpdate, session_stage};
pub use oauth::auth_router;
pub use provider::{GitHubStrategy, OAuthStrategy, Profile, ProviderError, TokenGrant};
pub use session::{
    SESSION_COOKIE, Session, create_session_token, decode_signed, encode_signed,
    verify_session_token,
};
