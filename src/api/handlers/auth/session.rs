//! Session lifecycle endpoints and the shared token response shape.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::issuer::{self, GateOutcome};
use super::middleware::{AuthSession, SESSION_COOKIE_NAME};
use super::state::{AuthConfig, AuthState};
use super::storage::{self, UserRow};
use super::types::{LoginResponse, SessionResponse};

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Resolved session identity", body = SessionResponse),
        (status = 401, description = "Invalid token", body = String)
    ),
    tag = "auth"
)]
pub async fn session(Extension(session): Extension<AuthSession>) -> impl IntoResponse {
    let response = SessionResponse {
        user_id: session.user_id.to_string(),
        provider: session.provider,
        provider_sub: session.provider_sub,
        permission: session.permission,
        expires_at: session.expires_at,
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    responses(
        (status = 200, description = "Replacement token issued", body = LoginResponse),
        (status = 401, description = "Invalid token", body = String),
        (status = 403, description = "Restricted tokens cannot refresh", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Extension(session): Extension<AuthSession>,
) -> impl IntoResponse {
    match issuer::refresh_session(&auth_state, &pool, session.user_id, session.token_id).await {
        Ok(Some((outcome, user))) => token_response(&auth_state, outcome, &user),
        Ok(None) => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()).into_response(),
        Err(err) => {
            error!("Session refresh failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Refresh failed".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Extension(session): Extension<AuthSession>,
) -> impl IntoResponse {
    if let Err(err) = storage::delete_session_by_hash(&pool, &session.token_hash).await {
        error!("Failed to delete session: {err}");
    }

    // Always clear the cookie, even if the row was already gone.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Re-run the gate chain for a profile after a verification step and
/// shape the reply.
pub(super) async fn resume_gates(
    pool: &PgPool,
    auth_state: &AuthState,
    user_id: Uuid,
) -> Response {
    let user = match storage::find_user_by_id(pool, user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (StatusCode::UNAUTHORIZED, "Invalid token".to_string()).into_response();
        }
        Err(err) => {
            error!("Profile lookup failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Token issuance failed".to_string(),
            )
                .into_response();
        }
    };
    match issuer::issue_for_user(auth_state, pool, &user).await {
        Ok(outcome) => token_response(auth_state, outcome, &user),
        Err(err) => {
            error!("Token issuance failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Token issuance failed".to_string(),
            )
                .into_response()
        }
    }
}

/// Shape the login envelope; a completed session also sets the cookie.
pub(super) fn token_response(
    auth_state: &AuthState,
    outcome: GateOutcome,
    user: &UserRow,
) -> Response {
    let envelope = issuer::login_response(outcome, user);
    let mut headers = HeaderMap::new();
    if let Some(token) = envelope.session_token.as_deref() {
        match session_cookie(auth_state, token) {
            Ok(cookie) => {
                headers.insert(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build session cookie: {err}"),
        }
    }
    (StatusCode::OK, headers, Json(envelope)).into_response()
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    auth_state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = auth_state.config().session_ttl_seconds();
    // Only mark cookies secure when the frontend is served over HTTPS.
    let secure = auth_state.config().session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(auth_config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = auth_config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
