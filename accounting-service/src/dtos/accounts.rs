use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 100, message = "Account name must be 1-100 characters"))]
    #[schema(example = "physics-lab")]
    pub name: String,

    #[serde(default = "default_active")]
    pub active: bool,

    #[validate(length(min = 1, max = 255))]
    #[schema(example = "Marie Curie")]
    pub principal_investigator: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub faculty: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub department: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccountListQuery {
    /// Only accounts the caller administers.
    #[serde(default)]
    pub admin: bool,
    /// Maximum accounts returned, 20 by default and at most 500.
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccountUserQuery {
    /// Grant account-admin rights with the membership.
    #[serde(default)]
    pub admin: bool,
}
