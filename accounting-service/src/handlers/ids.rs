use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::{dtos::ids::NumericIdResponse, middleware::AuthPrincipal, AppState};

/// POSIX gid of a group
#[utoipa::path(
    get,
    path = "/api/v1/ids/group/{name}",
    params(("name" = String, Path, description = "Group name")),
    responses(
        (status = 200, description = "Group id", body = NumericIdResponse),
        (status = 403, description = "Services and super-admins only", body = ErrorResponse),
        (status = 404, description = "No such group", body = ErrorResponse)
    ),
    tag = "Ids",
    security(("bearer_auth" = []))
)]
pub async fn group_id(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(name): Path<String>,
) -> Result<Json<NumericIdResponse>, AppError> {
    let id = state.accounting.group_gid(&principal, &name).await?;
    Ok(Json(NumericIdResponse { name, id }))
}

/// POSIX uid of a user
#[utoipa::path(
    get,
    path = "/api/v1/ids/user/{logon_name}",
    params(("logon_name" = String, Path, description = "Derived logon name")),
    responses(
        (status = 200, description = "User id", body = NumericIdResponse),
        (status = 403, description = "Services and super-admins only", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    ),
    tag = "Ids",
    security(("bearer_auth" = []))
)]
pub async fn user_id(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(logon_name): Path<String>,
) -> Result<Json<NumericIdResponse>, AppError> {
    let id = state.accounting.user_uid(&principal, &logon_name).await?;
    Ok(Json(NumericIdResponse { name: logon_name, id }))
}
