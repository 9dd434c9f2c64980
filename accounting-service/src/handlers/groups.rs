use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::groups::{CreateGroupRequest, GroupListQuery, MembershipQuery, UpdateGroupRequest},
    dtos::MessageResponse,
    middleware::AuthPrincipal,
    models::{Group, GroupRef, MemberResponse},
    utils::ValidatedJson,
    AppState,
};

/// Groups visible to the caller
///
/// Super-admins see every group, everybody else the groups they belong to.
#[utoipa::path(
    get,
    path = "/api/v1/groups",
    params(GroupListQuery),
    responses(
        (status = 200, description = "Groups", body = [Group]),
        (status = 403, description = "Services may not list groups", body = ErrorResponse)
    ),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn list_groups(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Query(query): Query<GroupListQuery>,
) -> Result<Json<Vec<Group>>, AppError> {
    Ok(Json(state
        .accounting
        .list_groups(&principal, query.active, query.limit)
        .await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn create_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ValidatedJson(req): ValidatedJson<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    let group = state.accounting.create_group(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/groups/{group}",
    params(("group" = String, Path, description = "Group id or name")),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Updated group", body = Group),
        (status = 403, description = "Not an administrator of the group", body = ErrorResponse),
        (status = 404, description = "No such group", body = ErrorResponse)
    ),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn update_group(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(group): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateGroupRequest>,
) -> Result<Json<Group>, AppError> {
    let group = GroupRef::parse(&group);
    Ok(Json(state.accounting.update_group(&principal, &group, req).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{group}/members",
    params(("group" = String, Path, description = "Group id or name")),
    responses(
        (status = 200, description = "Members with their admin flag", body = [MemberResponse]),
        (status = 403, description = "Not a member of the group", body = ErrorResponse)
    ),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(group): Path<String>,
) -> Result<Json<Vec<MemberResponse>>, AppError> {
    let group = GroupRef::parse(&group);
    Ok(Json(state.accounting.list_members(&principal, &group).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/groups/{group}/members/{dom_name}",
    params(
        ("group" = String, Path, description = "Group id or name"),
        ("dom_name" = String, Path, description = "Directory name of the user"),
        MembershipQuery
    ),
    responses(
        (status = 201, description = "Member added", body = MessageResponse),
        (status = 403, description = "Not an administrator of the group", body = ErrorResponse),
        (status = 404, description = "No such group or user", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse)
    ),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((group, dom_name)): Path<(String, String)>,
    Query(query): Query<MembershipQuery>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let group = GroupRef::parse(&group);
    state
        .accounting
        .add_member(&principal, &group, &dom_name, query.admin)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!("Added {}", dom_name))),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/groups/{group}/members/{dom_name}",
    params(
        ("group" = String, Path, description = "Group id or name"),
        ("dom_name" = String, Path, description = "Directory name of the user")
    ),
    responses(
        (status = 200, description = "Member removed", body = MessageResponse),
        (status = 403, description = "Not an administrator of the group", body = ErrorResponse),
        (status = 404, description = "Not a member", body = ErrorResponse)
    ),
    tag = "Groups",
    security(("bearer_auth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((group, dom_name)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    let group = GroupRef::parse(&group);
    state
        .accounting
        .remove_member(&principal, &group, &dom_name)
        .await?;
    Ok(Json(MessageResponse::new(format!("Removed {}", dom_name))))
}
