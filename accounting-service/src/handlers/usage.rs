use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::usage::{UsageBatchRequest, UsageBatchResponse, UsageQuery},
    middleware::AuthPrincipal,
    models::ResourceUsage,
    utils::ValidatedJson,
    AppState,
};

/// Record a batch of usage
///
/// Either every record is stored or none is.
#[utoipa::path(
    post,
    path = "/api/v1/usage",
    request_body = UsageBatchRequest,
    responses(
        (status = 201, description = "Records stored", body = UsageBatchResponse),
        (status = 403, description = "Caller may not record this resource", body = ErrorResponse),
        (status = 404, description = "Unknown resource or user", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Usage",
    security(("bearer_auth" = []))
)]
pub async fn insert_usage(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    ValidatedJson(req): ValidatedJson<UsageBatchRequest>,
) -> Result<(StatusCode, Json<UsageBatchResponse>), AppError> {
    let inserted = state.accounting.insert_usage(&principal, req.records).await?;
    Ok((StatusCode::CREATED, Json(UsageBatchResponse { inserted })))
}

#[utoipa::path(
    get,
    path = "/api/v1/usage",
    params(UsageQuery),
    responses(
        (status = 200, description = "Matching usage records", body = [ResourceUsage]),
        (status = 403, description = "Caller may not read this usage", body = ErrorResponse)
    ),
    tag = "Usage",
    security(("bearer_auth" = []))
)]
pub async fn list_usage(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Query(query): Query<UsageQuery>,
) -> Result<Json<Vec<ResourceUsage>>, AppError> {
    Ok(Json(state.accounting.list_usage(&principal, query).await?))
}
