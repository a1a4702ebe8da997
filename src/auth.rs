//! Handshake-time identity verification.
//!
//! Credentials never reach this process. The external auth service mints a
//! signed assertion (see `slchat_proto::assertion`); this module checks it
//! against the shared secret and extracts the display identity.

use crate::error::HandlerError;
use slchat_proto::assertion::{self, AssertionError};
use tracing::debug;

/// Secrets that ship in documentation or scaffolding and must never reach
/// production.
const KNOWN_PLACEHOLDER_SECRETS: &[&str] = &["secret", "change-me", "slchat-dev-secret"];

/// Minimum secret length we consider resistant to brute force.
const MIN_SECRET_LEN: usize = 16;

/// Whether the configured assertion secret is a default or weak value.
pub fn is_default_secret(secret: &str) -> bool {
    secret.len() < MIN_SECRET_LEN
        || KNOWN_PLACEHOLDER_SECRETS
            .iter()
            .any(|known| secret.eq_ignore_ascii_case(known))
}

/// Verify an assertion token and return the authenticated identity.
pub fn verify_token(token: &str, secret: &str) -> Result<String, HandlerError> {
    match assertion::verify(token, secret.as_bytes()) {
        Ok(claims) => Ok(claims.sub),
        Err(e) => {
            debug!(error = %e, "Assertion rejected");
            crate::metrics::auth_failures().inc();
            Err(HandlerError::Authentication(match e {
                AssertionError::Malformed => "malformed assertion",
                AssertionError::BadSignature => "bad signature",
                AssertionError::Expired => "assertion expired",
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slchat_proto::assertion::{sign, IdentityClaims};

    const SECRET: &str = "unit-test-secret-0123456789";

    #[test]
    fn valid_token_yields_identity() {
        let token = sign(
            &IdentityClaims { sub: "alice".into(), exp: chrono::Utc::now().timestamp() + 60 },
            SECRET.as_bytes(),
        );
        assert_eq!(verify_token(&token, SECRET).unwrap(), "alice");
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign(
            &IdentityClaims { sub: "alice".into(), exp: chrono::Utc::now().timestamp() - 1 },
            SECRET.as_bytes(),
        );
        let err = verify_token(&token, SECRET).unwrap_err();
        assert_eq!(err.error_code(), "authentication_error");
    }

    #[test]
    fn weak_secrets_are_flagged() {
        assert!(is_default_secret("secret"));
        assert!(is_default_secret("Change-Me"));
        assert!(is_default_secret("short"));
        assert!(!is_default_secret("Xk9#mQ2$vL8@pR4!wN6&"));
    }
}
