use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::{SanitizedUser, User};

/// Name of the group whose admin members are super-admins.
pub const ADMINS_GROUP: &str = "admins";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Group {
    pub id: Uuid,
    /// Store-assigned serial, exposed as a POSIX gid through the offset scheme.
    pub numeric_id: i64,
    #[schema(example = "physics")]
    pub name: String,
    pub active: bool,
    /// Informational only; ownership never grants any permission.
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String, active: bool, owner_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            numeric_id: 0,
            name,
            active,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A group addressed either by its id or by its unique name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    Id(Uuid),
    Name(String),
}

impl GroupRef {
    /// Path segments that parse as a UUID address the id, anything else the name.
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(id) => GroupRef::Id(id),
            Err(_) => GroupRef::Name(raw.to_string()),
        }
    }
}

impl From<Uuid> for GroupRef {
    fn from(id: Uuid) -> Self {
        GroupRef::Id(id)
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRef::Id(id) => write!(f, "{}", id),
            GroupRef::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct Membership {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub admin: bool,
}

/// A group seen from one of its members.
#[derive(Debug, Clone, FromRow)]
pub struct GroupMembership {
    #[sqlx(flatten)]
    pub group: Group,
    pub admin: bool,
}

/// A member seen from the group.
#[derive(Debug, Clone, FromRow)]
pub struct Member {
    #[sqlx(flatten)]
    pub user: User,
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    #[serde(flatten)]
    pub user: SanitizedUser,
    pub admin: bool,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            user: member.user.into(),
            admin: member.admin,
        }
    }
}

/// Filter applied by the store before groups are returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupFilter {
    pub active_only: bool,
    /// Restrict to groups this user belongs to.
    pub member: Option<Uuid>,
    /// Maximum rows, unbounded when absent.
    pub limit: Option<usize>,
}

/// Whitelisted group changes as applied by the store.
#[derive(Debug, Clone, Default)]
pub struct GroupUpdate {
    pub active: Option<bool>,
    pub owner_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_ref_parses_ids_and_names() {
        let id = Uuid::new_v4();
        assert_eq!(GroupRef::parse(&id.to_string()), GroupRef::Id(id));
        assert_eq!(GroupRef::parse("physics"), GroupRef::Name("physics".to_string()));
    }
}
