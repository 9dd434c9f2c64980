use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateResourceRequest {
    /// Services may only record usage for the resource carrying their name.
    #[validate(length(min = 1, max = 128, message = "Resource name must be 1-128 characters"))]
    #[schema(example = "batch-scheduler")]
    pub name: String,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
