//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed.
//!
//! Tokens are signed, not encrypted: anything placed in a payload is
//! readable by the browser that holds the cookie.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the signed [`Session`]
pub const SESSION_COOKIE: &str = "session";

/// User session data
///
/// Stored in a signed cookie. Holds only the provider access token;
/// the profile is fetched again from GitHub when it is needed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque GitHub access token
    pub identity_token: String,
    /// When session was created
    pub issued_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn mac_for(secret: &str) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::Encryption(e.to_string()))
}

/// Sign an arbitrary serializable value
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
pub fn encode_signed<T: Serialize>(value: &T, secret: &str) -> Result<String, AppError> {
    let payload = serde_json::to_vec(value).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload);

    let mut mac = mac_for(secret)?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify a signed token and decode its payload
///
/// # Errors
/// Returns `AppError::InvalidSession` if the token is malformed, the
/// signature does not match `secret`, or the payload does not decode as `T`.
pub fn decode_signed<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, AppError> {
    let (payload_b64, signature_b64) = token.split_once('.').ok_or(AppError::InvalidSession)?;
    if signature_b64.contains('.') {
        return Err(AppError::InvalidSession);
    }

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::InvalidSession)?;

    let mut mac = mac_for(secret)?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AppError::InvalidSession)?;

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::InvalidSession)?;

    serde_json::from_slice(&payload).map_err(|_| AppError::InvalidSession)
}

/// Create a signed session token
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    encode_signed(session, secret)
}

/// Verify and decode a session token
///
/// # Errors
/// Returns `AppError::InvalidSession` if the signature is invalid, the token
/// is malformed, or the session has expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, AppError> {
    let session: Session = decode_signed(token, secret)?;

    if session.is_expired() {
        return Err(AppError::InvalidSession);
    }

    Ok(session)
}
