//! Credential store: durable users, groups, memberships, accounts, services,
//! resources and usage records.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Account, AccountFilter, AccountMember, AccountPatch, AccountUser, Group, GroupFilter, GroupMembership, GroupRef, GroupUpdate, Member, Membership, Resource,
    ResourcePatch, ResourceUsage, Service, UsageFilter, User, UserPatch,
};

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("credential store error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Persistence contract. Every conditional insert is atomic: two concurrent
/// inserts of the same unique key yield exactly one success and one
/// [`StoreError::Conflict`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // users
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_dom_name(&self, dom_name: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_logon_name(&self, logon_name: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Logon names equal to `candidate` or starting with `candidate.`.
    async fn logon_names_like(&self, candidate: &str) -> Result<HashSet<String>, StoreError>;
    async fn update_user(&self, id: Uuid, patch: &UserPatch) -> Result<User, StoreError>;
    async fn set_user_seed(&self, id: Uuid, seed: &str) -> Result<User, StoreError>;
    /// Removes the user and, in the same operation, all of its group and
    /// account memberships.
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    // groups
    async fn insert_group(&self, group: Group) -> Result<Group, StoreError>;
    async fn find_group(&self, group: &GroupRef) -> Result<Option<Group>, StoreError>;
    async fn list_groups(&self, filter: GroupFilter) -> Result<Vec<Group>, StoreError>;
    async fn update_group(&self, id: Uuid, update: &GroupUpdate) -> Result<Group, StoreError>;

    // memberships
    async fn insert_membership(&self, membership: Membership) -> Result<(), StoreError>;
    async fn delete_membership(&self, group_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;
    async fn find_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;
    async fn list_members(&self, group_id: Uuid) -> Result<Vec<Member>, StoreError>;
    async fn list_user_groups(&self, user_id: Uuid) -> Result<Vec<GroupMembership>, StoreError>;

    // accounts
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError>;
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;
    async fn list_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, StoreError>;
    async fn update_account(&self, id: Uuid, patch: &AccountPatch) -> Result<Account, StoreError>;
    async fn insert_account_user(&self, row: AccountUser) -> Result<(), StoreError>;
    async fn delete_account_user(&self, account_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;
    async fn find_account_user(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccountUser>, StoreError>;
    async fn list_account_users(&self, account_id: Uuid) -> Result<Vec<AccountMember>, StoreError>;

    // services
    async fn insert_service(&self, service: Service) -> Result<Service, StoreError>;
    async fn find_service_by_access(&self, access: &str) -> Result<Option<Service>, StoreError>;
    async fn list_services(&self) -> Result<Vec<Service>, StoreError>;
    async fn delete_service(&self, name: &str) -> Result<(), StoreError>;

    // resources
    async fn insert_resource(&self, resource: Resource) -> Result<Resource, StoreError>;
    async fn find_resource_by_id(&self, id: Uuid) -> Result<Option<Resource>, StoreError>;
    async fn find_resource_by_name(&self, name: &str) -> Result<Option<Resource>, StoreError>;
    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError>;
    async fn update_resource(&self, id: Uuid, patch: &ResourcePatch)
        -> Result<Resource, StoreError>;
    async fn list_resource_groups(&self, resource_id: Uuid) -> Result<Vec<Group>, StoreError>;
    async fn add_resource_group(&self, resource_id: Uuid, group_id: Uuid)
        -> Result<(), StoreError>;
    async fn remove_resource_group(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> Result<(), StoreError>;

    // usage
    /// Inserts every record or none of them.
    async fn insert_usage(&self, records: Vec<ResourceUsage>) -> Result<usize, StoreError>;
    async fn list_usage(&self, filter: UsageFilter) -> Result<Vec<ResourceUsage>, StoreError>;
}

/// Shared handle that bounds every store call by the request deadline.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn CredentialStore>,
    deadline: Duration,
}

impl StoreHandle {
    pub fn new(inner: Arc<dyn CredentialStore>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    /// Runs one store call; an elapsed deadline surfaces as
    /// [`StoreError::Unavailable`], never as an empty answer.
    pub async fn run<'a, T, F, Fut>(&'a self, call: F) -> Result<T, StoreError>
    where
        F: FnOnce(&'a dyn CredentialStore) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.deadline, call(self.inner.as_ref())).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(deadline_ms = self.deadline.as_millis() as u64, "Credential store call timed out");
                Err(StoreError::Unavailable(format!(
                    "no answer within {} ms",
                    self.deadline.as_millis()
                )))
            }
        }
    }
}
