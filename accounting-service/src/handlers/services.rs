use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::services::CreateServiceRequest,
    dtos::MessageResponse,
    middleware::AuthPrincipal,
    models::{CreatedService, ServiceSummary},
    utils::ValidatedJson,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/services",
    responses(
        (status = 200, description = "Registered services", body = [ServiceSummary]),
        (status = 403, description = "Super-admins only", body = ErrorResponse)
    ),
    tag = "Services",
    security(("bearer_auth" = []))
)]
pub async fn list_services(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Vec<ServiceSummary>>, AppError> {
    Ok(Json(state.accounting.list_services(&principal).await?))
}

/// Register a service
///
/// The plaintext secret is in this response and nowhere else.
#[utoipa::path(
    post,
    path = "/api/v1/services",
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Service created", body = CreatedService),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 409, description = "Name already taken", body = ErrorResponse)
    ),
    tag = "Services",
    security(("bearer_auth" = []))
)]
pub async fn create_service(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ValidatedJson(req): ValidatedJson<CreateServiceRequest>,
) -> Result<(StatusCode, Json<CreatedService>), AppError> {
    let created = state.accounting.create_service(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/services/{name}",
    params(("name" = String, Path, description = "Service name")),
    responses(
        (status = 200, description = "Service deleted", body = MessageResponse),
        (status = 403, description = "Super-admins only", body = ErrorResponse),
        (status = 404, description = "No such service", body = ErrorResponse)
    ),
    tag = "Services",
    security(("bearer_auth" = []))
)]
pub async fn delete_service(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.accounting.delete_service(&principal, &name).await?;
    Ok(Json(MessageResponse::new(format!("Deleted {}", name))))
}
