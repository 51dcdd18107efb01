//! Request/response types for auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct IdentityLoginRequest {
    pub provider: String,
    pub assertion: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PhoneLoginRequest {
    pub phone: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct PhoneCodeRequest {
    pub phone: Option<String>,
    pub device: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PhoneVerifyRequest {
    pub code: String,
    pub device: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmailIntent {
    Register,
    Reset,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailCodeRequest {
    pub email: String,
    pub intent: EmailIntent,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailVerifyRequest {
    pub token: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub token: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordResetRequest {
    pub token: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserSummary {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub provider: String,
}

/// Envelope shared by every login-shaped endpoint. Exactly one of the
/// session pair or the flow pair is populated.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub requires_phone: bool,
    pub requires_terms_acceptance: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PhoneChallengeResponse {
    pub code_expires_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailCodeResponse {
    pub token: String,
    pub code_expires_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailVerifyResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// 422 body returned when a submitted code had already expired and a
/// replacement was dispatched.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CodeExpiredResponse {
    pub code: String,
    pub code_expires_at: DateTime<Utc>,
}

impl CodeExpiredResponse {
    pub(super) fn new(code_expires_at: DateTime<Utc>) -> Self {
        Self {
            code: "code_expired".to_string(),
            code_expires_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_sub: Option<String>,
    pub permission: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileResponse {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub provider: String,
    pub phone_verified: bool,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
