//! CSRF token issuing and verification
//!
//! Tokens are stateless: `"<issued-at>.<nonce>.<signature>"`, where the
//! signature is an HMAC-SHA256 over `"<issued-at>.<nonce>"` keyed with the
//! process-wide secret key.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::error::StartupError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the hidden form field carrying the token
pub const CSRF_FIELD: &str = "csrf_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("The CSRF token is missing.")]
    Missing,
    #[error("The CSRF token is invalid.")]
    Invalid,
    #[error("The CSRF token has expired.")]
    Expired,
}

/// Keyed MAC built once from the configured secret
#[derive(Clone)]
pub struct SecretKey {
    mac: HmacSha256,
}

impl SecretKey {
    pub fn new(secret: &str) -> Result<Self, StartupError> {
        if secret.is_empty() {
            return Err(StartupError::MissingSecretKey);
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| StartupError::MissingSecretKey)?;
        Ok(Self { mac })
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, payload: &str, signature: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(signature).is_ok()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Issues and checks CSRF tokens for form submissions
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    key: SecretKey,
    enabled: bool,
    time_limit: Option<i64>,
}

impl CsrfGuard {
    pub fn new(config: &SecurityConfig) -> Result<Self, StartupError> {
        Ok(Self {
            key: SecretKey::new(&config.secret_key)?,
            enabled: config.csrf_enabled,
            time_limit: match config.csrf_time_limit {
                0 => None,
                secs => Some(i64::try_from(secs).unwrap_or(i64::MAX)),
            },
        })
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn issue(&self) -> String {
        self.issue_at(chrono::Utc::now().timestamp())
    }

    pub fn verify(&self, token: Option<&str>) -> Result<(), CsrfError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    fn issue_at(&self, issued_at: i64) -> String {
        let nonce = hex::encode(rand::random::<[u8; 16]>());
        let payload = format!("{issued_at}.{nonce}");
        let signature = self.key.sign(&payload);
        format!("{payload}.{signature}")
    }

    fn verify_at(&self, token: Option<&str>, now: i64) -> Result<(), CsrfError> {
        if !self.enabled {
            return Ok(());
        }
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(CsrfError::Missing),
        };

        let (payload, signature) = token.rsplit_once('.').ok_or(CsrfError::Invalid)?;
        let signature = hex::decode(signature).map_err(|_| CsrfError::Invalid)?;
        if !self.key.verify(payload, &signature) {
            return Err(CsrfError::Invalid);
        }

        let issued_at: i64 = payload
            .split_once('.')
            .and_then(|(ts, _)| ts.parse().ok())
            .ok_or(CsrfError::Invalid)?;
        match self.time_limit {
            Some(limit) if now.saturating_sub(issued_at) > limit => Err(CsrfError::Expired),
            _ => Ok(()),
        }
    }
}
