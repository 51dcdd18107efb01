use axum::response::IntoResponse;

/// Undocumented landing route, returns the service identity line.
pub async fn root() -> impl IntoResponse {
    crate::APP_USER_AGENT
}
