use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 256, message = "Directory name must be 1-256 characters"))]
    #[schema(example = "jane.doe@example.org")]
    pub dom_name: String,

    #[validate(length(min = 1, max = 256, message = "Full name must be 1-256 characters"))]
    #[schema(example = "Jane Doe")]
    pub full_name: String,
}
