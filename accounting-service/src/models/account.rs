use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::user::{SanitizedUser, User};

/// The billing unit: who pays for what the account's users consume.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Account {
    pub id: Uuid,
    #[schema(example = "physics-lab")]
    pub name: String,
    pub active: bool,
    #[schema(example = "Marie Curie")]
    pub principal_investigator: Option<String>,
    #[schema(example = "Science")]
    pub faculty: Option<String>,
    #[schema(example = "Physics")]
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: String, active: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            active,
            principal_investigator: None,
            faculty: None,
            department: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Whitelisted account changes. The name is fixed at creation.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AccountPatch {
    pub active: Option<bool>,
    #[validate(length(min = 1, max = 255))]
    pub principal_investigator: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub faculty: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub department: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.active.is_none()
            && self.principal_investigator.is_none()
            && self.faculty.is_none()
            && self.department.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct AccountUser {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub admin: bool,
}

/// A user seen from the account.
#[derive(Debug, Clone, FromRow)]
pub struct AccountMember {
    #[sqlx(flatten)]
    pub user: User,
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountMemberResponse {
    #[serde(flatten)]
    pub user: SanitizedUser,
    pub admin: bool,
}

impl From<AccountMember> for AccountMemberResponse {
    fn from(member: AccountMember) -> Self {
        Self {
            user: member.user.into(),
            admin: member.admin,
        }
    }
}

/// Filter applied by the store before accounts are returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountFilter {
    /// Restrict to accounts this user belongs to.
    pub member: Option<Uuid>,
    /// With `member`, only the accounts that user administers.
    pub admin_only: bool,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_reject_unknown_fields() {
        let err = serde_json::from_str::<AccountPatch>(r#"{"name":"renamed"}"#);
        assert!(err.is_err());

        let patch: AccountPatch = serde_json::from_str(r#"{"faculty":"Science"}"#).unwrap();
        assert!(!patch.is_empty());
        assert!(AccountPatch::default().is_empty());
    }
}
