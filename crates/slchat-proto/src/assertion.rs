//! Identity assertions.
//!
//! The coordinator never sees credentials: an external auth service validates
//! them and mints a compact signed assertion, which the client presents in its
//! `auth` event. The format is `base64url(claims) "." base64url(mac)` where
//! the MAC is HMAC-SHA256 over the claims bytes with a secret shared between
//! the auth service and the daemon.
//!
//! Both halves of the contract live here so the test harness (and any
//! co-deployed auth service) can mint tokens the daemon accepts.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by an identity assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// The authenticated username.
    pub sub: String,
    /// Expiry as a Unix timestamp (seconds).
    pub exp: i64,
}

/// Why an assertion was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssertionError {
    #[error("malformed assertion")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("assertion expired")]
    Expired,
}

/// Sign claims into a presentable assertion token.
pub fn sign(claims: &IdentityClaims, secret: &[u8]) -> String {
    // Serializing a two-field struct cannot fail.
    let body = serde_json::to_vec(claims).expect("claims serialize");
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(&body);
    let tag = mac.finalize().into_bytes();
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(body),
        URL_SAFE_NO_PAD.encode(tag)
    )
}

/// Verify a token against the shared secret, checking expiry at `now`
/// (Unix seconds). Returns the embedded claims on success.
pub fn verify_at(token: &str, secret: &[u8], now: i64) -> Result<IdentityClaims, AssertionError> {
    let (body_b64, tag_b64) = token.split_once('.').ok_or(AssertionError::Malformed)?;
    let body = URL_SAFE_NO_PAD
        .decode(body_b64)
        .map_err(|_| AssertionError::Malformed)?;
    let tag = URL_SAFE_NO_PAD
        .decode(tag_b64)
        .map_err(|_| AssertionError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(&body);
    // Constant-time comparison via the Mac trait.
    mac.verify_slice(&tag)
        .map_err(|_| AssertionError::BadSignature)?;

    let claims: IdentityClaims =
        serde_json::from_slice(&body).map_err(|_| AssertionError::Malformed)?;
    if claims.exp <= now {
        return Err(AssertionError::Expired);
    }
    Ok(claims)
}

/// Verify a token against the shared secret at the current time.
pub fn verify(token: &str, secret: &[u8]) -> Result<IdentityClaims, AssertionError> {
    verify_at(token, secret, chrono::Utc::now().timestamp())
}
