use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::auth::{AuthenticateRequest, AuthenticateResponse, LoginRequest, LoginResponse},
    dtos::MessageResponse,
    middleware::{bearer_token, AuthPrincipal},
    utils::ValidatedJson,
    AppState,
};

/// Open a session
///
/// Accepts the administrator access code, a service access code or a
/// directory login. Presenting the current bearer again returns it unchanged.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened or already active", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
        (status = 503, description = "Credential backend unavailable", body = ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), AppError> {
    let outcome = state
        .sessions
        .login(&req.username, &req.password, bearer_token(&headers))
        .await?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            token: outcome.token,
            token_type: "Bearer".to_string(),
            expires_in: outcome.expires_in,
            already_active: outcome.already_active,
        }),
    ))
}

/// End the caller's session
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "Session",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<MessageResponse>, AppError> {
    state.sessions.logout(&principal.session_key()).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

/// Verify a user's one-time password
#[utoipa::path(
    post,
    path = "/api/v1/authenticate",
    request_body = AuthenticateRequest,
    responses(
        (status = 200, description = "Code accepted", body = AuthenticateResponse),
        (status = 401, description = "Code rejected or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller may not verify codes", body = ErrorResponse),
        (status = 404, description = "Unknown logon name", body = ErrorResponse)
    ),
    tag = "Session",
    security(("bearer_auth" = []))
)]
pub async fn authenticate(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ValidatedJson(req): ValidatedJson<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, AppError> {
    let user_id = state
        .accounting
        .verify_otp(&principal, &req.logon_name, &req.otp)
        .await?;
    Ok(Json(AuthenticateResponse { user_id }))
}
