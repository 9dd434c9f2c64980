use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, max = 128, message = "Service name must be 1-128 characters"))]
    #[schema(example = "batch-scheduler")]
    pub name: String,
}
