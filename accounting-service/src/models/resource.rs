use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Resource {
    pub id: Uuid,
    #[schema(example = "cluster-a")]
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn new(name: String, active: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ResourcePatch {
    #[validate(length(min = 1, max = 128, message = "Resource name must be 1-128 characters"))]
    pub name: Option<String>,
    pub active: Option<bool>,
}

impl ResourcePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.active.is_none()
    }
}

/// One immutable accounting record: what a user consumed on a resource
/// during a window.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceUsage {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub user_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub metrics: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

impl ResourceUsage {
    pub fn new(
        resource_id: Uuid,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        metrics: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_id,
            user_id,
            start,
            end,
            metrics,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UsageFilter {
    pub resource_id: Uuid,
    pub user_id: Option<Uuid>,
    /// Records starting at or after this instant.
    pub start: Option<DateTime<Utc>>,
    /// Records ending at or before this instant.
    pub end: Option<DateTime<Utc>>,
}

impl UsageFilter {
    pub fn matches(&self, usage: &ResourceUsage) -> bool {
        usage.resource_id == self.resource_id
            && self.user_id.map_or(true, |u| usage.user_id == u)
            && self.start.map_or(true, |s| usage.start >= s)
            && self.end.map_or(true, |e| usage.end <= e)
    }
}
