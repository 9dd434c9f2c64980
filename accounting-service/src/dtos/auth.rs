use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Directory login name, service access code, or the administrator
    /// access code.
    #[validate(length(min = 1, max = 256, message = "Username is required"))]
    #[schema(example = "jane.doe@example.org")]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 3600)]
    pub expires_in: i64,
    /// The presented bearer was already current; no new token was issued.
    pub already_active: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AuthenticateRequest {
    #[validate(length(min = 1, max = 128, message = "Logon name is required"))]
    #[schema(example = "jadoe.example")]
    pub logon_name: String,

    #[validate(length(equal = 6, message = "OTP must be 6 digits"))]
    #[schema(example = "287082")]
    pub otp: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthenticateResponse {
    pub user_id: Uuid,
}
