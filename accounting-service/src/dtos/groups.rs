use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 128, message = "Group name must be 1-128 characters"))]
    #[schema(example = "physics")]
    pub name: String,

    #[serde(default = "default_active")]
    pub active: bool,

    /// `dom_name` of the owning user. Informational only.
    #[schema(example = "jane.doe@example.org")]
    pub owner: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Whitelisted group patch.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateGroupRequest {
    pub active: Option<bool>,
    /// `dom_name` of the new owner.
    #[validate(length(min = 1, max = 256))]
    pub owner: Option<String>,
}

impl UpdateGroupRequest {
    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.owner.is_none()
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GroupListQuery {
    /// Only active groups when true.
    pub active: Option<bool>,
    /// Maximum groups returned, 50 by default and at most 500.
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MembershipQuery {
    /// Grant group-admin rights with the membership.
    #[serde(default)]
    pub admin: bool,
}
