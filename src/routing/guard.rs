//! Access guard
//!
//! Path prefixes listed in `security.protected` require a static bearer token
//! in the `Authorization` header. The check runs before route lookup, so a
//! guarded prefix answers 401/403 even for paths that do not exist.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::ProtectedPrefix;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    /// No usable credentials were presented
    Unauthenticated,
    /// Credentials were presented but do not match
    Forbidden,
}

/// Decide whether a request for `path` may proceed
pub fn check_access(
    path: &str,
    authorization: Option<&str>,
    protected: &[ProtectedPrefix],
) -> AccessDecision {
    let Some(rule) = protected.iter().find(|p| match_prefix(&p.prefix, path)) else {
        return AccessDecision::Allowed;
    };

    match authorization.and_then(bearer_token) {
        None => AccessDecision::Unauthenticated,
        Some(token) if tokens_match(token, &rule.token) => AccessDecision::Allowed,
        Some(_) => AccessDecision::Forbidden,
    }
}

/// Compare fixed-length tags of both tokens in constant time, so timing does
/// not reveal how much of the presented token was right
fn tokens_match(presented: &str, expected: &str) -> bool {
    let tag = |token: &str| {
        HmacSha256::new_from_slice(expected.as_bytes()).map(|mut mac| {
            mac.update(token.as_bytes());
            mac
        })
    };
    match (tag(presented), tag(expected)) {
        (Ok(presented), Ok(expected)) => presented
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

/// Prefix match on whole path segments: `/admin` guards `/admin` and
/// `/admin/x` but not `/administrator`
fn match_prefix(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Extract the credential of a `Bearer` authorization value
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
