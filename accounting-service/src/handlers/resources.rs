use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::resources::CreateResourceRequest,
    dtos::MessageResponse,
    middleware::AuthPrincipal,
    models::{Group, GroupRef, Resource, ResourcePatch},
    utils::ValidatedJson,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/resources",
    responses(
        (status = 200, description = "Resources", body = [Resource]),
        (status = 403, description = "Super-admins only", body = ErrorResponse)
    ),
    tag = "Resources",
    security(("bearer_auth" = []))
)]
pub async fn list_resources(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Vec<Resource>>, AppError> {
    Ok(Json(state.accounting.list_resources(&principal).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/resources",
    request_body = CreateResourceRequest,
    responses(
        (status = 201, description = "Resource created", body = Resource),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    tag = "Resources",
    security(("bearer_auth" = []))
)]
pub async fn create_resource(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ValidatedJson(req): ValidatedJson<CreateResourceRequest>,
) -> Result<(StatusCode, Json<Resource>), AppError> {
    let resource = state.accounting.create_resource(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/resources/{id}",
    params(("id" = Uuid, Path, description = "Resource id")),
    request_body = ResourcePatch,
    responses(
        (status = 200, description = "Updated resource", body = Resource),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "No such resource", body = ErrorResponse)
    ),
    tag = "Resources",
    security(("bearer_auth" = []))
)]
pub async fn update_resource(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(patch): ValidatedJson<ResourcePatch>,
) -> Result<Json<Resource>, AppError> {
    Ok(Json(state.accounting.update_resource(&principal, id, patch).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/resources/{id}/groups",
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 200, description = "Groups tied to the resource", body = [Group]),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "No such resource", body = ErrorResponse)
    ),
    tag = "Resources",
    security(("bearer_auth" = []))
)]
pub async fn list_resource_groups(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Group>>, AppError> {
    Ok(Json(state.accounting.list_resource_groups(&principal, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/resources/{id}/groups/{group}",
    params(
        ("id" = Uuid, Path, description = "Resource id"),
        ("group" = String, Path, description = "Group id or name")
    ),
    responses(
        (status = 201, description = "Group associated", body = MessageResponse),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "No such resource or group", body = ErrorResponse),
        (status = 409, description = "Already associated", body = ErrorResponse)
    ),
    tag = "Resources",
    security(("bearer_auth" = []))
)]
pub async fn add_resource_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((id, group)): Path<(Uuid, String)>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let group_ref = GroupRef::parse(&group);
    state
        .accounting
        .add_resource_group(&principal, id, &group_ref)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!("Associated {}", group))),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/resources/{id}/groups/{group}",
    params(
        ("id" = Uuid, Path, description = "Resource id"),
        ("group" = String, Path, description = "Group id or name")
    ),
    responses(
        (status = 200, description = "Group dissociated", body = MessageResponse),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "Not associated", body = ErrorResponse)
    ),
    tag = "Resources",
    security(("bearer_auth" = []))
)]
pub async fn remove_resource_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((id, group)): Path<(Uuid, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    let group_ref = GroupRef::parse(&group);
    state
        .accounting
        .remove_resource_group(&principal, id, &group_ref)
        .await?;
    Ok(Json(MessageResponse::new(format!("Dissociated {}", group))))
}
