use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::users::CreateUserRequest,
    dtos::MessageResponse,
    middleware::AuthPrincipal,
    models::{UserPatch, UserProfile, UserWithGroups},
    utils::ValidatedJson,
    AppState,
};

/// List users with their groups
#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "All users", body = [UserWithGroups]),
        (status = 403, description = "Super-admins only", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Vec<UserWithGroups>>, AppError> {
    Ok(Json(state.accounting.list_users(&principal).await?))
}

/// Create a user
///
/// The generated seed is not part of the response; the user reads it from
/// `/users/me`.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserWithGroups),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 409, description = "dom_name already exists", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserWithGroups>), AppError> {
    let user = state.accounting.create_user(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User with groups", body = UserWithGroups),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<UserWithGroups>, AppError> {
    Ok(Json(state.accounting.get_user(&principal, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "Updated user", body = UserWithGroups),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(patch): ValidatedJson<UserPatch>,
) -> Result<Json<UserWithGroups>, AppError> {
    Ok(Json(state.accounting.update_user(&principal, id, patch).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{dom_name}",
    params(("dom_name" = String, Path, description = "Directory name of the user")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(dom_name): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.accounting.delete_user(&principal, &dom_name).await?;
    Ok(Json(MessageResponse::new(format!("Deleted {}", dom_name))))
}

/// Look a user up by directory name
#[utoipa::path(
    get,
    path = "/api/v1/users/find/{dom_name}",
    params(("dom_name" = String, Path, description = "Directory name of the user")),
    responses(
        (status = 200, description = "User with groups", body = UserWithGroups),
        (status = 403, description = "Not an administrator of any of the user's groups", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn find_user(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(dom_name): Path<String>,
) -> Result<Json<UserWithGroups>, AppError> {
    Ok(Json(state.accounting.find_user(&principal, &dom_name).await?))
}

/// Own profile, including the TOTP seed
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 404, description = "Caller is not a user", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.accounting.me(&principal).await?))
}

/// Replace the caller's TOTP seed
#[utoipa::path(
    post,
    path = "/api/v1/users/me/seed",
    responses(
        (status = 200, description = "Profile with the new seed", body = UserProfile),
        (status = 404, description = "Caller is not a user", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn regenerate_seed(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.accounting.regenerate_seed(&principal).await?))
}
