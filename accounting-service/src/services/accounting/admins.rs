use super::AccountingService;
use crate::models::{GroupRef, MemberResponse, Membership, Principal, ADMINS_GROUP};
use crate::services::authz::{Action, Scope};
use crate::services::error::ServiceError;

fn admins() -> GroupRef {
    GroupRef::Name(ADMINS_GROUP.to_string())
}

impl AccountingService {
    pub async fn list_admins(&self, principal: &Principal) -> Result<Vec<MemberResponse>, ServiceError> {
        self.require(principal, Action::ManageAdmins, Scope::Global).await?;

        let group = self.group(&admins()).await?;
        let members = self.store.run(|s| s.list_members(group.id)).await?;
        Ok(members.into_iter().map(MemberResponse::from).collect())
    }

    pub async fn add_admin(&self, principal: &Principal, dom_name: &str) -> Result<(), ServiceError> {
        self.require(principal, Action::ManageAdmins, Scope::Global).await?;

        let group = self.group(&admins()).await?;
        let user = self.user_by_dom_name(dom_name).await?;
        let membership = Membership {
            group_id: group.id,
            user_id: user.id,
            admin: true,
        };
        self.store
            .run(|s| s.insert_membership(membership))
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => {
                    ServiceError::Conflict(format!("'{}' is already in '{}'", dom_name, ADMINS_GROUP))
                }
                other => other,
            })?;

        tracing::info!(actor = %principal.name, target = %dom_name, "Administrator added");
        Ok(())
    }

    pub async fn remove_admin(&self, principal: &Principal, dom_name: &str) -> Result<(), ServiceError> {
        self.require(principal, Action::ManageAdmins, Scope::Global).await?;

        let group = self.group(&admins()).await?;
        let user = self.user_by_dom_name(dom_name).await?;
        self.store
            .run(|s| s.delete_membership(group.id, user.id))
            .await?;

        tracing::info!(actor = %principal.name, target = %dom_name, "Administrator removed");
        Ok(())
    }
}
