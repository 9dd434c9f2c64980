use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{models::Principal, AppState};

/// Header accepted as an alternative to `Authorization: Bearer`.
pub const TOKEN_HEADER: &str = "x-token";

/// The bearer presented with the request, from `Authorization: Bearer` or
/// `X-Token`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let from_authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    from_authorization
        .or_else(|| headers.get(TOKEN_HEADER).and_then(|value| value.to_str().ok()))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the bearer into the current principal of its session.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(req.headers()) else {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Missing or invalid Authorization header"
        )));
    };

    let principal = state.sessions.validate(token).await?;
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Principal placed in the request by [`auth_middleware`].
pub struct AuthPrincipal(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Principal missing from request extensions"))
        })?;

        Ok(AuthPrincipal(principal.clone()))
    }
}
