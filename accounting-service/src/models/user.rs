use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::group::GroupMembership;

/// A human principal. `seed` is the TOTP secret and must only leave the
/// service through [`UserProfile`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Store-assigned serial, exposed as a POSIX uid through the offset scheme.
    pub numeric_id: i64,
    pub dom_name: String,
    pub full_name: String,
    pub logon_name: String,
    pub seed: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(dom_name: String, full_name: String, logon_name: String, seed: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            numeric_id: 0,
            dom_name,
            full_name,
            logon_name,
            seed,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Directory names are case-insensitive; this is the form they are stored
/// and looked up in.
pub fn normalize_dom_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// User representation without the TOTP seed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SanitizedUser {
    pub id: Uuid,
    pub numeric_id: i64,
    #[schema(example = "jane.doe@example.org")]
    pub dom_name: String,
    #[schema(example = "Jane Doe")]
    pub full_name: String,
    #[schema(example = "jadoe.example")]
    pub logon_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for SanitizedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            numeric_id: user.numeric_id,
            dom_name: user.dom_name,
            full_name: user.full_name,
            logon_name: user.logon_name,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserGroupSummary {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub admin: bool,
}

impl From<GroupMembership> for UserGroupSummary {
    fn from(m: GroupMembership) -> Self {
        Self {
            id: m.group.id,
            name: m.group.name,
            active: m.group.active,
            admin: m.admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserWithGroups {
    #[serde(flatten)]
    pub user: SanitizedUser,
    pub groups: Vec<UserGroupSummary>,
}

/// A user's own view of themselves, including the TOTP seed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: SanitizedUser,
    #[schema(example = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP")]
    pub seed: String,
    pub groups: Vec<UserGroupSummary>,
}

/// Fields a super-admin may change on an existing user. Unknown fields are
/// rejected so identifiers and seeds cannot be overwritten through a patch.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    #[validate(length(min = 1, max = 256, message = "Full name must be 1-256 characters"))]
    pub full_name: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_user_never_carries_the_seed() {
        let user = User::new(
            "jane.doe@example.org".to_string(),
            "Jane Doe".to_string(),
            "jadoe.example".to_string(),
            "JBSWY3DPEHPK3PXP".to_string(),
        );
        let json = serde_json::to_string(&SanitizedUser::from(user)).unwrap();
        assert!(!json.contains("seed"));
        assert!(!json.contains("JBSWY3DPEHPK3PXP"));
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let res: Result<UserPatch, _> = serde_json::from_str(r#"{"seed": "AAAA"}"#);
        assert!(res.is_err());
        let patch: UserPatch = serde_json::from_str(r#"{"full_name": "J. Doe"}"#).unwrap();
        assert_eq!(patch.full_name.as_deref(), Some("J. Doe"));
    }
}
