//! # Rakonti (Session & Verification Core)
//!
//! `rakonti` is the authentication core of the Rakonti audiobook platform.
//! It issues opaque bearer tokens, walks new accounts through the phone and
//! terms-of-service verification gates, and shields every mutating route
//! with a duplicate request guard.
//!
//! ## Tokens
//!
//! Tokens are 32 random bytes, base64url encoded; only their SHA-256 digest
//! is ever persisted. A token is either a full session or a *restricted flow
//! token* that can only call the verification routes until the account
//! clears its gates.
//!
//! ## Verification Gates
//!
//! Password and identity-provider logins yield a full session only once the
//! account has a verified phone number and accepted the current terms.
//! Until then the login answers with a restricted flow token plus
//! `requires_phone` / `requires_terms` flags so the client knows which gate
//! comes next.
//!
//! ## Duplicate Guard
//!
//! Unsafe requests are fingerprinted over method, path, body, bearer and
//! client hints. An identical request that is still in flight, or that
//! completed inside the retention window, is answered with
//! `429 Duplicate request` instead of being executed twice.
//!
//! ## Trusted Time
//!
//! Expiry stamps are taken from configurable remote time sources with a
//! fallback to the local clock; liveness comparisons always use the local
//! clock so a skewed source can never keep dead records alive.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
