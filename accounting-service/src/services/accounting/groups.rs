use uuid::Uuid;

use super::AccountingService;
use crate::dtos::groups::{CreateGroupRequest, UpdateGroupRequest};
use crate::models::{Group, GroupFilter, GroupRef, GroupUpdate, MemberResponse, Membership, Principal};
use crate::services::authz::{Action, Scope};
use crate::services::error::ServiceError;

use super::list_limit;

const DEFAULT_GROUP_LIMIT: usize = 50;

impl AccountingService {
    /// Super-admins see every group, users only the groups they belong to.
    pub async fn list_groups(
        &self,
        principal: &Principal,
        active: Option<bool>,
        limit: Option<usize>,
    ) -> Result<Vec<Group>, ServiceError> {
        self.require(principal, Action::ListGroups, Scope::Global).await?;

        let member = if self.authz.is_super_admin(principal).await? {
            None
        } else {
            // only users get past ListGroups without being super-admins
            Some(principal.user_id().ok_or(ServiceError::AuthorizationDenied)?)
        };
        let filter = GroupFilter {
            active_only: active.unwrap_or(false),
            member,
            limit: Some(list_limit(limit, DEFAULT_GROUP_LIMIT)),
        };

        Ok(self.store.run(|s| s.list_groups(filter)).await?)
    }

    pub async fn create_group(
        &self,
        principal: &Principal,
        req: CreateGroupRequest,
    ) -> Result<Group, ServiceError> {
        self.require(principal, Action::CreateGroup, Scope::Global).await?;

        let owner_id = self.owner_id(req.owner.as_deref()).await?;
        let group = Group::new(req.name, req.active, owner_id);
        let group = self.store.run(|s| s.insert_group(group)).await?;

        tracing::info!(actor = %principal.name, target = %group.name, "Group created");
        Ok(group)
    }

    pub async fn update_group(
        &self,
        principal: &Principal,
        group: &GroupRef,
        req: UpdateGroupRequest,
    ) -> Result<Group, ServiceError> {
        self.require(principal, Action::UpdateGroup, Scope::Group(group.clone()))
            .await?;
        if req.is_empty() {
            return Err(ServiceError::Validation("Nothing to update".to_string()));
        }

        let target = self.group(group).await?;
        let update = GroupUpdate {
            active: req.active,
            owner_id: self.owner_id(req.owner.as_deref()).await?,
        };
        let updated = self.store.run(|s| s.update_group(target.id, &update)).await?;

        tracing::info!(actor = %principal.name, target = %updated.name, "Group updated");
        Ok(updated)
    }

    pub async fn list_members(
        &self,
        principal: &Principal,
        group: &GroupRef,
    ) -> Result<Vec<MemberResponse>, ServiceError> {
        self.require(principal, Action::ReadGroupMembers, Scope::Group(group.clone()))
            .await?;

        let target = self.group(group).await?;
        let members = self.store.run(|s| s.list_members(target.id)).await?;
        Ok(members.into_iter().map(MemberResponse::from).collect())
    }

    /// Conflict when the user already belongs to the group, whatever the
    /// admin flag.
    pub async fn add_member(
        &self,
        principal: &Principal,
        group: &GroupRef,
        dom_name: &str,
        admin: bool,
    ) -> Result<(), ServiceError> {
        self.require(principal, Action::ManageMembership, Scope::Group(group.clone()))
            .await?;

        let target = self.group(group).await?;
        let user = self.user_by_dom_name(dom_name).await?;
        let membership = Membership {
            group_id: target.id,
            user_id: user.id,
            admin,
        };
        self.store
            .run(|s| s.insert_membership(membership))
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => ServiceError::Conflict(format!(
                    "'{}' is already a member of '{}'",
                    dom_name, target.name
                )),
                other => other,
            })?;

        tracing::info!(
            actor = %principal.name,
            target = %dom_name,
            group = %target.name,
            admin,
            "Member added"
        );
        Ok(())
    }

    pub async fn remove_member(
        &self,
        principal: &Principal,
        group: &GroupRef,
        dom_name: &str,
    ) -> Result<(), ServiceError> {
        self.require(principal, Action::ManageMembership, Scope::Group(group.clone()))
            .await?;

        let target = self.group(group).await?;
        let user = self.user_by_dom_name(dom_name).await?;
        self.store
            .run(|s| s.delete_membership(target.id, user.id))
            .await?;

        tracing::info!(actor = %principal.name, target = %dom_name, group = %target.name, "Member removed");
        Ok(())
    }

    async fn owner_id(&self, owner: Option<&str>) -> Result<Option<Uuid>, ServiceError> {
        match owner {
            Some(dom_name) => Ok(Some(self.user_by_dom_name(dom_name).await?.id)),
            None => Ok(None),
        }
    }
}
