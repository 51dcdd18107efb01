//! Profile endpoint for authenticated sessions.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use tracing::error;

use super::middleware::AuthSession;
use super::storage;
use super::types::ProfileResponse;

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Profile of the authenticated user", body = ProfileResponse),
        (status = 401, description = "Invalid token", body = String),
        (status = 403, description = "Restricted tokens cannot read the profile", body = String)
    ),
    tag = "me"
)]
pub async fn me(
    pool: Extension<PgPool>,
    Extension(session): Extension<AuthSession>,
) -> impl IntoResponse {
    let user = match storage::find_user_by_id(&pool, session.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (StatusCode::UNAUTHORIZED, "Invalid token".to_string()).into_response();
        }
        Err(err) => {
            error!("Profile lookup failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Profile lookup failed".to_string(),
            )
                .into_response();
        }
    };

    let response = ProfileResponse {
        id: user.id.to_string(),
        email: user.email,
        phone: user.phone,
        display_name: user.display_name,
        provider: user.provider,
        phone_verified: user.phone_verified_at.is_some(),
        terms_accepted_at: user.terms_accepted_at,
        created_at: user.created_at,
    };
    (StatusCode::OK, Json(response)).into_response()
}
