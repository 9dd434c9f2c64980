use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{dtos::MessageResponse, middleware::AuthPrincipal, models::MemberResponse, AppState};

/// Members of the `admins` group
#[utoipa::path(
    get,
    path = "/api/v1/admins",
    responses(
        (status = 200, description = "Administrators", body = [MemberResponse]),
        (status = 403, description = "Super-admins only", body = ErrorResponse)
    ),
    tag = "Admins",
    security(("bearer_auth" = []))
)]
pub async fn list_admins(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Vec<MemberResponse>>, AppError> {
    Ok(Json(state.accounting.list_admins(&principal).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admins/{dom_name}",
    params(("dom_name" = String, Path, description = "Directory name of the user")),
    responses(
        (status = 201, description = "Administrator added", body = MessageResponse),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse),
        (status = 409, description = "Already an administrator", body = ErrorResponse)
    ),
    tag = "Admins",
    security(("bearer_auth" = []))
)]
pub async fn add_admin(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(dom_name): Path<String>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    state.accounting.add_admin(&principal, &dom_name).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!("Added {} to admins", dom_name))),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admins/{dom_name}",
    params(("dom_name" = String, Path, description = "Directory name of the user")),
    responses(
        (status = 200, description = "Administrator removed", body = MessageResponse),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "Not an administrator", body = ErrorResponse)
    ),
    tag = "Admins",
    security(("bearer_auth" = []))
)]
pub async fn remove_admin(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(dom_name): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.accounting.remove_admin(&principal, &dom_name).await?;
    Ok(Json(MessageResponse::new(format!("Removed {} from admins", dom_name))))
}
