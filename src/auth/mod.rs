//! Stateless admin session tokens.
//!
//! A token is `"{timestamp_ms}.{hex hmac-sha256}"` signed under the admin
//! session secret. No server-side session storage: verification recomputes
//! the signature and checks the age. Secret strength is validated on every
//! use and a weak secret fails closed, so no token can ever verify against a
//! misconfigured deployment.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Tokens expire after 24 hours.
const TOKEN_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Minimum acceptable secret length.
const MIN_SECRET_LEN: usize = 32;

/// Signing keys for admin session tokens.
#[derive(Debug, Clone)]
pub struct SessionKeys {
    secret: String,
}

impl SessionKeys {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token for the current time.
    ///
    /// Returns `None` when the secret is too weak to sign with.
    #[must_use]
    pub fn issue(&self) -> Option<String> {
        self.issue_at(Utc::now().timestamp_millis())
    }

    /// Issue a token for an explicit clock reading (tests).
    #[must_use]
    pub fn issue_at(&self, now_ms: i64) -> Option<String> {
        let secret = self.checked_secret()?;
        let timestamp = now_ms.to_string();
        let signature = hex::encode(sign(secret, &timestamp));
        Some(format!("{timestamp}.{signature}"))
    }

    /// Verify a token against the current time.
    #[must_use]
    pub fn verify(&self, token: &str) -> bool {
        self.verify_at(token, Utc::now().timestamp_millis())
    }

    /// Verify a token against an explicit clock reading (tests).
    ///
    /// Rejects malformed tokens, unparsable timestamps, tokens older than
    /// 24 hours, and signatures that fail a constant-time comparison against
    /// the recomputed HMAC.
    #[must_use]
    pub fn verify_at(&self, token: &str, now_ms: i64) -> bool {
        let Some(secret) = self.checked_secret() else {
            return false;
        };

        let Some((timestamp, signature)) = token.split_once('.') else {
            return false;
        };
        if timestamp.is_empty() || signature.is_empty() {
            return false;
        }

        let Ok(issued_ms) = timestamp.parse::<i64>() else {
            return false;
        };
        if now_ms - issued_ms > TOKEN_TTL_MS {
            return false;
        }

        let Ok(provided) = hex::decode(signature) else {
            return false;
        };

        // Mac::verify_slice rejects length mismatches and compares in
        // constant time, so a probe learns nothing from response timing.
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(timestamp.as_bytes());
        mac.verify_slice(&provided).is_ok()
    }

    /// The secret, if strong enough to use. Checked on every call so a
    /// weakened secret disables the auth path immediately.
    fn checked_secret(&self) -> Option<&str> {
        let trimmed = self.secret.trim();
        if trimmed.len() < MIN_SECRET_LEN || trimmed.to_lowercase().contains("changeme") {
            warn!("Admin session secret is too weak; refusing to sign or verify tokens");
            return None;
        }
        Some(trimmed)
    }
}

fn sign(secret: &str, message: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}
