use service_core::error::AppError;
use thiserror::Error;

use crate::identity::ProviderError;
use crate::secrets::SecretError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Bad, missing, expired or superseded credentials. The message is
    /// deliberately generic.
    #[error("Authentication failed")]
    AuthenticationFailure,

    #[error("Not authorized")]
    AuthorizationDenied,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(e) => ServiceError::UpstreamUnavailable(e),
            StoreError::Conflict(what) => ServiceError::Conflict(format!("{} already exists", what)),
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::Internal(e) => ServiceError::Internal(e),
        }
    }
}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(e) => ServiceError::UpstreamUnavailable(e),
            ProviderError::Misconfigured(e) => {
                ServiceError::Internal(anyhow::anyhow!("identity provider misconfigured: {}", e))
            }
        }
    }
}

impl From<SecretError> for ServiceError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::InvalidDirectoryName(_) => ServiceError::Validation(err.to_string()),
            SecretError::GenerationExhausted { .. } => ServiceError::Conflict(err.to_string()),
            SecretError::InvalidSeed => ServiceError::Internal(anyhow::anyhow!(err)),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::AuthenticationFailure => {
                AppError::Unauthorized(anyhow::anyhow!("Authentication failed"))
            }
            ServiceError::AuthorizationDenied => AppError::Forbidden(anyhow::anyhow!("Not authorized")),
            ServiceError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            ServiceError::Conflict(e) => AppError::Conflict(anyhow::anyhow!(e)),
            ServiceError::UpstreamUnavailable(e) => AppError::ServiceUnavailable(e),
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        let cases = [
            (ServiceError::AuthenticationFailure, StatusCode::UNAUTHORIZED),
            (ServiceError::AuthorizationDenied, StatusCode::FORBIDDEN),
            (ServiceError::NotFound("user".into()), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("dup".into()), StatusCode::CONFLICT),
            (ServiceError::UpstreamUnavailable("db".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn store_and_provider_outages_are_unavailable() {
        let err: ServiceError = StoreError::Unavailable("timeout".into()).into();
        assert!(matches!(err, ServiceError::UpstreamUnavailable(_)));
        let err: ServiceError = ProviderError::Unavailable("ldap down".into()).into();
        assert!(matches!(err, ServiceError::UpstreamUnavailable(_)));
    }
}
