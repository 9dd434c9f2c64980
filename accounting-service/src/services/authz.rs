//! Tiered authorization: super-admin, then group-admin or account-admin,
//! then member/self, then deny. Decisions are computed per call from the store; nothing is
//! cached between requests.

use std::collections::HashSet;
use uuid::Uuid;

use super::error::ServiceError;
use super::metrics;
use crate::config::SuperAdminProof;
use crate::models::{GroupRef, Identity, Principal, ADMINS_GROUP};
use crate::store::StoreHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListUsers,
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
    ReadOwnProfile,
    RegenerateSeed,
    ManageAdmins,
    ManageServices,
    ListGroups,
    CreateGroup,
    UpdateGroup,
    ReadGroupMembers,
    ManageMembership,
    ListAccounts,
    CreateAccount,
    UpdateAccount,
    ReadAccountUsers,
    ManageAccountUsers,
    ManageResources,
    InsertUsage,
    ReadUsage,
    VerifyOtp,
    LookupIds,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ListUsers => "list_users",
            Action::CreateUser => "create_user",
            Action::ReadUser => "read_user",
            Action::UpdateUser => "update_user",
            Action::DeleteUser => "delete_user",
            Action::ReadOwnProfile => "read_own_profile",
            Action::RegenerateSeed => "regenerate_seed",
            Action::ManageAdmins => "manage_admins",
            Action::ManageServices => "manage_services",
            Action::ListGroups => "list_groups",
            Action::CreateGroup => "create_group",
            Action::UpdateGroup => "update_group",
            Action::ReadGroupMembers => "read_group_members",
            Action::ManageMembership => "manage_membership",
            Action::ListAccounts => "list_accounts",
            Action::CreateAccount => "create_account",
            Action::UpdateAccount => "update_account",
            Action::ReadAccountUsers => "read_account_users",
            Action::ManageAccountUsers => "manage_account_users",
            Action::ManageResources => "manage_resources",
            Action::InsertUsage => "insert_usage",
            Action::ReadUsage => "read_usage",
            Action::VerifyOtp => "verify_otp",
            Action::LookupIds => "lookup_ids",
        }
    }

    /// Actions a service principal may perform.
    fn open_to_services(&self) -> bool {
        matches!(self, Action::VerifyOtp | Action::LookupIds | Action::InsertUsage)
    }
}

/// What an action is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Global,
    Group(GroupRef),
    Account(Uuid),
    /// Data belonging to the given user, requested as the caller's own.
    OwnData(Uuid),
    /// Another user's record.
    User(Uuid),
    Usage { resource_id: Uuid, user_id: Uuid },
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Group(g) => write!(f, "group:{}", g),
            Scope::Account(id) => write!(f, "account:{}", id),
            Scope::OwnData(id) => write!(f, "self:{}", id),
            Scope::User(id) => write!(f, "user:{}", id),
            Scope::Usage { resource_id, user_id } => write!(f, "usage:{}/{}", resource_id, user_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    fn from_bool(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationEngine {
    store: StoreHandle,
    proof: SuperAdminProof,
}

impl AuthorizationEngine {
    pub fn new(store: StoreHandle, proof: SuperAdminProof) -> Self {
        Self { store, proof }
    }

    /// Store failures surface as errors, never as a deny.
    pub async fn authorize(
        &self,
        principal: &Principal,
        action: Action,
        scope: &Scope,
    ) -> Result<Decision, ServiceError> {
        let decision = self.decide(principal, action, scope).await?;

        metrics::record_authz(action.as_str(), decision.is_allowed());
        if !decision.is_allowed() {
            tracing::info!(
                actor = %principal.name,
                actor_kind = principal.identity.kind(),
                action = action.as_str(),
                target = %scope,
                "Authorization denied"
            );
        }

        Ok(decision)
    }

    /// Like [`authorize`](Self::authorize) but turns a deny into
    /// [`ServiceError::AuthorizationDenied`].
    pub async fn require(
        &self,
        principal: &Principal,
        action: Action,
        scope: &Scope,
    ) -> Result<(), ServiceError> {
        match self.authorize(principal, action, scope).await? {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(ServiceError::AuthorizationDenied),
        }
    }

    pub async fn is_super_admin(&self, principal: &Principal) -> Result<bool, ServiceError> {
        match principal.identity {
            Identity::SuperAdmin => Ok(true),
            Identity::Service(_) => Ok(false),
            Identity::User(_) if principal.directory_admin => Ok(true),
            Identity::User(user_id) => match self.proof {
                SuperAdminProof::Sentinel => Ok(false),
                SuperAdminProof::AdminsGroup => {
                    let admins = GroupRef::Name(ADMINS_GROUP.to_string());
                    let Some(group) = self.store.run(|s| s.find_group(&admins)).await? else {
                        return Ok(false);
                    };
                    let membership = self
                        .store
                        .run(|s| s.find_membership(group.id, user_id))
                        .await?;
                    Ok(membership.is_some_and(|m| m.admin))
                }
            },
        }
    }

    async fn decide(
        &self,
        principal: &Principal,
        action: Action,
        scope: &Scope,
    ) -> Result<Decision, ServiceError> {
        let user_id = match principal.identity {
            Identity::SuperAdmin => return Ok(Decision::Allow),
            Identity::Service(_) => {
                return Ok(Decision::from_bool(
                    action.open_to_services() && *scope == Scope::Global,
                ))
            }
            Identity::User(id) => id,
        };

        if self.is_super_admin(principal).await? {
            return Ok(Decision::Allow);
        }

        let allowed = match (action, scope) {
            (Action::ReadOwnProfile | Action::RegenerateSeed, Scope::OwnData(id)) => *id == user_id,
            // Every user may list groups; the listing is narrowed to their own.
            (Action::ListGroups, Scope::Global) => true,
            (Action::UpdateGroup | Action::ManageMembership, Scope::Group(group)) => {
                self.group_role(group, user_id).await? == Some(true)
            }
            (Action::ReadGroupMembers, Scope::Group(group)) => {
                self.group_role(group, user_id).await?.is_some()
            }
            // Same for accounts.
            (Action::ListAccounts, Scope::Global) => true,
            (Action::UpdateAccount | Action::ManageAccountUsers, Scope::Account(account)) => {
                self.account_role(*account, user_id).await? == Some(true)
            }
            (Action::ReadAccountUsers, Scope::Account(account)) => {
                self.account_role(*account, user_id).await?.is_some()
            }
            (Action::ReadUser, Scope::User(target)) => {
                *target == user_id || self.administers_user(user_id, *target).await?
            }
            (Action::ReadUsage, Scope::OwnData(id)) => *id == user_id,
            (Action::ReadUsage, Scope::Usage { resource_id, user_id: target }) => {
                *target == user_id
                    || self
                        .administers_usage(user_id, *resource_id, *target)
                        .await?
            }
            _ => false,
        };

        Ok(Decision::from_bool(allowed))
    }

    /// `Some(admin)` when the user belongs to the group, `None` when it does
    /// not or the group cannot be resolved.
    async fn group_role(&self, group: &GroupRef, user_id: Uuid) -> Result<Option<bool>, ServiceError> {
        let Some(group) = self.store.run(|s| s.find_group(group)).await? else {
            return Ok(None);
        };
        let membership = self
            .store
            .run(|s| s.find_membership(group.id, user_id))
            .await?;
        Ok(membership.map(|m| m.admin))
    }

    /// `Some(admin)` when the user belongs to the account. A missing account
    /// has no rows, so it resolves to `None` as well.
    async fn account_role(&self, account_id: Uuid, user_id: Uuid) -> Result<Option<bool>, ServiceError> {
        let row = self
            .store
            .run(|s| s.find_account_user(account_id, user_id))
            .await?;
        Ok(row.map(|r| r.admin))
    }

    async fn administered_groups(&self, user_id: Uuid) -> Result<HashSet<Uuid>, ServiceError> {
        let groups = self.store.run(|s| s.list_user_groups(user_id)).await?;
        Ok(groups
            .into_iter()
            .filter(|g| g.admin)
            .map(|g| g.group.id)
            .collect())
    }

    async fn member_groups(&self, user_id: Uuid) -> Result<HashSet<Uuid>, ServiceError> {
        let groups = self.store.run(|s| s.list_user_groups(user_id)).await?;
        Ok(groups.into_iter().map(|g| g.group.id).collect())
    }

    /// Group-admin of some group the target belongs to.
    async fn administers_user(&self, caller: Uuid, target: Uuid) -> Result<bool, ServiceError> {
        let administered = self.administered_groups(caller).await?;
        if administered.is_empty() {
            return Ok(false);
        }
        let target_groups = self.member_groups(target).await?;
        Ok(!administered.is_disjoint(&target_groups))
    }

    /// Group-admin of some group that is associated with the resource and
    /// contains the target.
    async fn administers_usage(
        &self,
        caller: Uuid,
        resource_id: Uuid,
        target: Uuid,
    ) -> Result<bool, ServiceError> {
        let administered = self.administered_groups(caller).await?;
        if administered.is_empty() {
            return Ok(false);
        }
        let target_groups = self.member_groups(target).await?;
        let resource_groups = self
            .store
            .run(|s| s.list_resource_groups(resource_id))
            .await?;

        Ok(resource_groups
            .iter()
            .any(|g| administered.contains(&g.id) && target_groups.contains(&g.id)))
    }
}
