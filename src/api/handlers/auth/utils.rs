//! Small helpers shared by the auth handlers.

use axum::http::StatusCode;
use regex::Regex;
use tracing::error;

use super::pending::PendingError;

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Normalize a phone number to digits with an optional leading `+`.
pub(super) fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    for (index, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (index == 0 && c == '+') {
            normalized.push(c);
        }
    }
    normalized
}

/// E.164-ish format check on already-normalized input.
pub(super) fn valid_phone(phone_normalized: &str) -> bool {
    Regex::new(r"^\+?[0-9]{7,15}$").is_ok_and(|regex| regex.is_match(phone_normalized))
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Map a pending-store error onto the wire. `failure` is the client-facing
/// message for internal errors; the cause is logged instead of leaked.
/// Expired codes carry a structured body, so callers intercept those first.
pub(super) fn pending_error_response(err: PendingError, failure: &str) -> (StatusCode, String) {
    match err {
        PendingError::InvalidToken
        | PendingError::InvalidCode { .. }
        | PendingError::AttemptsExhausted
        | PendingError::DeviceMismatch => (StatusCode::UNAUTHORIZED, err.to_string()),
        PendingError::CodeMissing => (StatusCode::BAD_REQUEST, err.to_string()),
        PendingError::DestinationMissing => {
            (StatusCode::BAD_REQUEST, "Missing phone number".to_string())
        }
        PendingError::ResendThrottled { .. } => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
        PendingError::CodeExpired { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        PendingError::Codec(cause) => {
            error!("{failure}: {cause}");
            (StatusCode::INTERNAL_SERVER_ERROR, failure.to_string())
        }
    }
}

/// Extract a client IP for request fingerprinting from common proxy headers.
pub(super) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
