//! Accounting operations. Every public method authorizes the caller before
//! looking anything up, so a caller without rights learns nothing about
//! which records exist.

mod accounts;
mod admins;
mod groups;
mod ids;
mod principals;
mod resources;
mod usage;
mod users;

use uuid::Uuid;

use super::authz::{Action, AuthorizationEngine, Scope};
use super::error::ServiceError;
use super::session::SessionManager;
use crate::config::IdOffsets;
use crate::models::{
    normalize_dom_name, Group, GroupRef, Principal, User, UserGroupSummary, UserWithGroups, ADMINS_GROUP,
};
use crate::store::StoreHandle;

/// Upper bound on any listing's `limit`.
pub const MAX_LIST_LIMIT: usize = 500;

/// Requested page size clamped to `1..=MAX_LIST_LIMIT`.
pub(crate) fn list_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_LIST_LIMIT)
}

#[derive(Clone)]
pub struct AccountingService {
    store: StoreHandle,
    authz: AuthorizationEngine,
    sessions: SessionManager,
    ids: IdOffsets,
}

impl AccountingService {
    pub fn new(
        store: StoreHandle,
        authz: AuthorizationEngine,
        sessions: SessionManager,
        ids: IdOffsets,
    ) -> Self {
        Self {
            store,
            authz,
            sessions,
            ids,
        }
    }

    /// Creates the `admins` group when it is missing.
    pub async fn bootstrap(&self) -> Result<(), ServiceError> {
        let admins = GroupRef::Name(ADMINS_GROUP.to_string());
        if self.store.run(|s| s.find_group(&admins)).await?.is_some() {
            return Ok(());
        }

        let group = Group::new(ADMINS_GROUP.to_string(), true, None);
        match self.store.run(|s| s.insert_group(group)).await {
            Ok(group) => {
                tracing::info!(group_id = %group.id, "Created admins group");
                Ok(())
            }
            // another instance got there first
            Err(crate::store::StoreError::Conflict(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.store.run(|s| s.health_check()).await?;
        self.sessions.health_check().await
    }

    async fn require(&self, principal: &Principal, action: Action, scope: Scope) -> Result<(), ServiceError> {
        self.authz.require(principal, action, &scope).await
    }

    /// For lookups whose target must exist before the authorization scope
    /// is known: a missing target is NotFound for super-admins and a deny
    /// for everybody else.
    async fn missing(&self, principal: &Principal, what: &str) -> ServiceError {
        match self.authz.is_super_admin(principal).await {
            Ok(true) => ServiceError::NotFound(what.to_string()),
            Ok(false) => ServiceError::AuthorizationDenied,
            Err(e) => e,
        }
    }

    async fn user_by_dom_name(&self, dom_name: &str) -> Result<User, ServiceError> {
        let key = normalize_dom_name(dom_name);
        self.store
            .run(|s| s.find_user_by_dom_name(&key))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user '{}'", dom_name)))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<User, ServiceError> {
        self.store
            .run(|s| s.find_user_by_id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound("user".to_string()))
    }

    async fn group(&self, group: &GroupRef) -> Result<Group, ServiceError> {
        self.store
            .run(|s| s.find_group(group))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("group '{}'", group)))
    }

    async fn group_summaries(&self, user_id: Uuid) -> Result<Vec<UserGroupSummary>, ServiceError> {
        let groups = self.store.run(|s| s.list_user_groups(user_id)).await?;
        Ok(groups.into_iter().map(UserGroupSummary::from).collect())
    }

    async fn with_groups(&self, user: User) -> Result<UserWithGroups, ServiceError> {
        let groups = self.group_summaries(user.id).await?;
        Ok(UserWithGroups {
            user: user.into(),
            groups,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let svc = test_support::accounting();
        svc.bootstrap().await.unwrap();
        svc.bootstrap().await.unwrap();

        let groups = svc
            .store
            .run(|s| s.list_groups(Default::default()))
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, ADMINS_GROUP);
    }
}
