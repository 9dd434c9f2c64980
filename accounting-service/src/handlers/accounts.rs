use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::accounts::{AccountListQuery, AccountUserQuery, CreateAccountRequest},
    dtos::MessageResponse,
    middleware::AuthPrincipal,
    models::{Account, AccountMemberResponse, AccountPatch},
    utils::ValidatedJson,
    AppState,
};

/// Accounts visible to the caller
///
/// Super-admins see every account, everybody else the accounts they belong
/// to; `admin=true` narrows to the ones the caller administers.
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    params(AccountListQuery),
    responses(
        (status = 200, description = "Accounts", body = [Account]),
        (status = 403, description = "Services may not list accounts", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(("bearer_auth" = []))
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Query(query): Query<AccountListQuery>,
) -> Result<Json<Vec<Account>>, AppError> {
    Ok(Json(
        state
            .accounting
            .list_accounts(&principal, query.admin, query.limit)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = Account),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(("bearer_auth" = []))
)]
pub async fn create_account(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ValidatedJson(req): ValidatedJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = state.accounting.create_account(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/accounts/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = AccountPatch,
    responses(
        (status = 200, description = "Updated account", body = Account),
        (status = 403, description = "Not an administrator of the account", body = ErrorResponse),
        (status = 404, description = "No such account", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(("bearer_auth" = []))
)]
pub async fn update_account(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(patch): ValidatedJson<AccountPatch>,
) -> Result<Json<Account>, AppError> {
    Ok(Json(state.accounting.update_account(&principal, id, patch).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}/users",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Users with their admin flag", body = [AccountMemberResponse]),
        (status = 403, description = "Not a user of the account", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(("bearer_auth" = []))
)]
pub async fn list_account_users(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AccountMemberResponse>>, AppError> {
    Ok(Json(state.accounting.list_account_users(&principal, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/accounts/{id}/users/{dom_name}",
    params(
        ("id" = Uuid, Path, description = "Account id"),
        ("dom_name" = String, Path, description = "Directory name of the user"),
        AccountUserQuery
    ),
    responses(
        (status = 201, description = "User added", body = MessageResponse),
        (status = 403, description = "Not an administrator of the account", body = ErrorResponse),
        (status = 404, description = "No such account or user", body = ErrorResponse),
        (status = 409, description = "Already a user of the account", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(("bearer_auth" = []))
)]
pub async fn add_account_user(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((id, dom_name)): Path<(Uuid, String)>,
    Query(query): Query<AccountUserQuery>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    state
        .accounting
        .add_account_user(&principal, id, &dom_name, query.admin)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!("Added {}", dom_name))),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/accounts/{id}/users/{dom_name}",
    params(
        ("id" = Uuid, Path, description = "Account id"),
        ("dom_name" = String, Path, description = "Directory name of the user")
    ),
    responses(
        (status = 200, description = "User removed", body = MessageResponse),
        (status = 403, description = "Not an administrator of the account", body = ErrorResponse),
        (status = 404, description = "Not a user of the account", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(("bearer_auth" = []))
)]
pub async fn remove_account_user(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path((id, dom_name)): Path<(Uuid, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .accounting
        .remove_account_user(&principal, id, &dom_name)
        .await?;
    Ok(Json(MessageResponse::new(format!("Removed {}", dom_name))))
}
