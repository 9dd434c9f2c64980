use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Who a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    /// The sentinel administrator configured at deploy time.
    SuperAdmin,
    User(Uuid),
    Service(Uuid),
}

impl Identity {
    pub fn kind(&self) -> &'static str {
        match self {
            Identity::SuperAdmin => "super_admin",
            Identity::User(_) => "user",
            Identity::Service(_) => "service",
        }
    }
}

/// Session key of the sentinel administrator.
pub const SUPER_ADMIN_NAME: &str = "admin";

/// An authenticated caller, resolved from a current bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    /// Human-facing name: a user's `dom_name`, a service name, or `admin`.
    pub name: String,
    pub identity: Identity,
    /// Set at login when the directory reported one of the configured
    /// administrator groups for this user.
    #[serde(default)]
    pub directory_admin: bool,
}

impl Principal {
    pub fn super_admin() -> Self {
        Self {
            name: SUPER_ADMIN_NAME.to_string(),
            identity: Identity::SuperAdmin,
            directory_admin: false,
        }
    }

    pub fn user(id: Uuid, dom_name: impl Into<String>, directory_admin: bool) -> Self {
        Self {
            name: dom_name.into(),
            identity: Identity::User(id),
            directory_admin,
        }
    }

    pub fn service(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: Identity::Service(id),
            directory_admin: false,
        }
    }

    /// Key under which this principal's single current session is kept.
    /// Namespaced so a service and a user sharing a name never collide.
    pub fn session_key(&self) -> String {
        session_key(&self.identity, &self.name)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self.identity {
            Identity::User(id) => Some(id),
            _ => None,
        }
    }
}

pub fn session_key(identity: &Identity, name: &str) -> String {
    match identity {
        Identity::SuperAdmin => SUPER_ADMIN_NAME.to_string(),
        Identity::User(_) => user_session_key(name),
        Identity::Service(_) => service_session_key(name),
    }
}

pub fn user_session_key(dom_name: &str) -> String {
    format!("user:{}", dom_name)
}

pub fn service_session_key(name: &str) -> String {
    format!("service:{}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_keys_are_namespaced() {
        let id = Uuid::new_v4();
        assert_eq!(Principal::super_admin().session_key(), "admin");
        assert_eq!(Principal::user(id, "backup", false).session_key(), "user:backup");
        assert_eq!(Principal::service(id, "backup").session_key(), "service:backup");
    }

    #[test]
    fn identity_serializes_with_kind_tag() {
        let id = Uuid::nil();
        let json = serde_json::to_value(Identity::User(id)).unwrap();
        assert_eq!(json["kind"], "user");
        assert_eq!(json["id"], id.to_string());
        let json = serde_json::to_value(Identity::SuperAdmin).unwrap();
        assert_eq!(json["kind"], "super_admin");
    }
}
