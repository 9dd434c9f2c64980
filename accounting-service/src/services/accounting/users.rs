use uuid::Uuid;

use super::AccountingService;
use crate::dtos::users::CreateUserRequest;
use crate::models::{
    normalize_dom_name, user_session_key, Principal, UserPatch, UserProfile, UserWithGroups,
};
use crate::secrets::totp;
use crate::services::authz::{Action, Scope};
use crate::services::error::ServiceError;
use crate::services::provisioning::provision_user;

impl AccountingService {
    pub async fn list_users(&self, principal: &Principal) -> Result<Vec<UserWithGroups>, ServiceError> {
        self.require(principal, Action::ListUsers, Scope::Global).await?;

        let users = self.store.run(|s| s.list_users()).await?;
        let mut listed = Vec::with_capacity(users.len());
        for user in users {
            listed.push(self.with_groups(user).await?);
        }
        Ok(listed)
    }

    /// The new seed stays with the user; only `/users/me` ever shows it.
    pub async fn create_user(
        &self,
        principal: &Principal,
        req: CreateUserRequest,
    ) -> Result<UserWithGroups, ServiceError> {
        self.require(principal, Action::CreateUser, Scope::Global).await?;

        let user = provision_user(&self.store, &req.dom_name, &req.full_name).await?;
        tracing::info!(actor = %principal.name, target = %user.dom_name, "User created");

        Ok(UserWithGroups {
            user: user.into(),
            groups: vec![],
        })
    }

    /// Any user by id; super-admins only.
    pub async fn get_user(&self, principal: &Principal, id: Uuid) -> Result<UserWithGroups, ServiceError> {
        self.require(principal, Action::ReadUser, Scope::Global).await?;
        let user = self.user_by_id(id).await?;
        self.with_groups(user).await
    }

    pub async fn update_user(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: UserPatch,
    ) -> Result<UserWithGroups, ServiceError> {
        self.require(principal, Action::UpdateUser, Scope::Global).await?;
        if patch.is_empty() {
            return Err(ServiceError::Validation("Nothing to update".to_string()));
        }

        let user = self.store.run(|s| s.update_user(id, &patch)).await?;
        tracing::info!(actor = %principal.name, target = %user.dom_name, "User updated");
        self.with_groups(user).await
    }

    /// Removes the user with its memberships and ends its session.
    pub async fn delete_user(&self, principal: &Principal, dom_name: &str) -> Result<(), ServiceError> {
        self.require(principal, Action::DeleteUser, Scope::Global).await?;

        let user = self.user_by_dom_name(dom_name).await?;
        self.store.run(|s| s.delete_user(user.id)).await?;
        self.sessions.logout(&user_session_key(&user.dom_name)).await?;

        tracing::info!(actor = %principal.name, target = %user.dom_name, "User deleted");
        Ok(())
    }

    /// Super-admins, the user themself, or a group-admin of any group the
    /// user belongs to.
    pub async fn find_user(&self, principal: &Principal, dom_name: &str) -> Result<UserWithGroups, ServiceError> {
        let key = normalize_dom_name(dom_name);
        let Some(user) = self.store.run(|s| s.find_user_by_dom_name(&key)).await? else {
            return Err(self.missing(principal, "user").await);
        };
        self.require(principal, Action::ReadUser, Scope::User(user.id)).await?;
        self.with_groups(user).await
    }

    pub async fn me(&self, principal: &Principal) -> Result<UserProfile, ServiceError> {
        let id = principal
            .user_id()
            .ok_or_else(|| ServiceError::NotFound("user profile".to_string()))?;
        self.require(principal, Action::ReadOwnProfile, Scope::OwnData(id)).await?;

        let user = self.user_by_id(id).await?;
        let groups = self.group_summaries(id).await?;
        Ok(UserProfile {
            seed: user.seed.clone(),
            user: user.into(),
            groups,
        })
    }

    pub async fn regenerate_seed(&self, principal: &Principal) -> Result<UserProfile, ServiceError> {
        let id = principal
            .user_id()
            .ok_or_else(|| ServiceError::NotFound("user profile".to_string()))?;
        self.require(principal, Action::RegenerateSeed, Scope::OwnData(id)).await?;

        let seed = totp::generate_seed();
        let user = self.store.run(|s| s.set_user_seed(id, &seed)).await?;
        tracing::info!(actor = %principal.name, "TOTP seed regenerated");

        let groups = self.group_summaries(id).await?;
        Ok(UserProfile {
            seed: user.seed.clone(),
            user: user.into(),
            groups,
        })
    }
}
