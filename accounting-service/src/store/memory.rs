//! In-process credential store for tests and single-node development.
//! One lock guards every table, so each call is atomic.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{CredentialStore, StoreError};
use crate::models::{
    Account, AccountFilter, AccountMember, AccountPatch, AccountUser, Group, GroupFilter, GroupMembership, GroupRef, GroupUpdate, Member, Membership, Resource,
    ResourcePatch, ResourceUsage, Service, UsageFilter, User, UserPatch,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    groups: HashMap<Uuid, Group>,
    memberships: HashMap<(Uuid, Uuid), Membership>,
    accounts: HashMap<Uuid, Account>,
    account_users: HashMap<(Uuid, Uuid), AccountUser>,
    services: HashMap<Uuid, Service>,
    resources: HashMap<Uuid, Resource>,
    resource_groups: BTreeSet<(Uuid, Uuid)>,
    usage: Vec<ResourceUsage>,
    next_user_number: i64,
    next_group_number: i64,
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    tables: Mutex<Tables>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Internal(anyhow::anyhow!("credential store lock poisoned")))
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn insert_user(&self, mut user: User) -> Result<User, StoreError> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.dom_name == user.dom_name) {
            return Err(StoreError::Conflict(format!("user '{}'", user.dom_name)));
        }
        if t.users.values().any(|u| u.logon_name == user.logon_name) {
            return Err(StoreError::Conflict(format!("logon name '{}'", user.logon_name)));
        }
        t.next_user_number += 1;
        user.numeric_id = t.next_user_number;
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_dom_name(&self, dom_name: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.dom_name == dom_name)
            .cloned())
    }

    async fn find_user_by_logon_name(&self, logon_name: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.logon_name == logon_name)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = self.lock()?.users.values().cloned().collect();
        Ok(sorted_by(users, |u: &User| u.dom_name.clone()))
    }

    async fn logon_names_like(&self, candidate: &str) -> Result<HashSet<String>, StoreError> {
        let prefix = format!("{}.", candidate);
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|u| u.logon_name == candidate || u.logon_name.starts_with(&prefix))
            .map(|u| u.logon_name.clone())
            .collect())
    }

    async fn update_user(&self, id: Uuid, patch: &UserPatch) -> Result<User, StoreError> {
        let mut t = self.lock()?;
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("user".to_string()))?;
        if let Some(full_name) = &patch.full_name {
            user.full_name = full_name.clone();
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_user_seed(&self, id: Uuid, seed: &str) -> Result<User, StoreError> {
        let mut t = self.lock()?;
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("user".to_string()))?;
        user.seed = seed.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if t.users.remove(&id).is_none() {
            return Err(StoreError::NotFound("user".to_string()));
        }
        t.memberships.retain(|(_, user_id), _| *user_id != id);
        t.account_users.retain(|(_, user_id), _| *user_id != id);
        t.usage.retain(|u| u.user_id != id);
        for group in t.groups.values_mut() {
            if group.owner_id == Some(id) {
                group.owner_id = None;
            }
        }
        Ok(())
    }

    async fn insert_group(&self, mut group: Group) -> Result<Group, StoreError> {
        let mut t = self.lock()?;
        if t.groups.values().any(|g| g.name == group.name) {
            return Err(StoreError::Conflict(format!("group '{}'", group.name)));
        }
        t.next_group_number += 1;
        group.numeric_id = t.next_group_number;
        t.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn find_group(&self, group: &GroupRef) -> Result<Option<Group>, StoreError> {
        let t = self.lock()?;
        Ok(match group {
            GroupRef::Id(id) => t.groups.get(id).cloned(),
            GroupRef::Name(name) => t.groups.values().find(|g| &g.name == name).cloned(),
        })
    }

    async fn list_groups(&self, filter: GroupFilter) -> Result<Vec<Group>, StoreError> {
        let t = self.lock()?;
        let groups = t
            .groups
            .values()
            .filter(|g| !filter.active_only || g.active)
            .filter(|g| {
                filter
                    .member
                    .map_or(true, |user_id| t.memberships.contains_key(&(g.id, user_id)))
            })
            .cloned()
            .collect();
        let mut groups = sorted_by(groups, |g: &Group| g.name.clone());
        if let Some(limit) = filter.limit {
            groups.truncate(limit);
        }
        Ok(groups)
    }

    async fn update_group(&self, id: Uuid, update: &GroupUpdate) -> Result<Group, StoreError> {
        let mut t = self.lock()?;
        if let Some(owner) = update.owner_id {
            if !t.users.contains_key(&owner) {
                return Err(StoreError::NotFound("owner".to_string()));
            }
        }
        let group = t
            .groups
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("group".to_string()))?;
        if let Some(active) = update.active {
            group.active = active;
        }
        if let Some(owner) = update.owner_id {
            group.owner_id = Some(owner);
        }
        group.updated_at = Utc::now();
        Ok(group.clone())
    }

    async fn insert_membership(&self, membership: Membership) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if !t.groups.contains_key(&membership.group_id) {
            return Err(StoreError::NotFound("group".to_string()));
        }
        if !t.users.contains_key(&membership.user_id) {
            return Err(StoreError::NotFound("user".to_string()));
        }
        let key = (membership.group_id, membership.user_id);
        if t.memberships.contains_key(&key) {
            return Err(StoreError::Conflict("membership".to_string()));
        }
        t.memberships.insert(key, membership);
        Ok(())
    }

    async fn delete_membership(&self, group_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        self.lock()?
            .memberships
            .remove(&(group_id, user_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("membership".to_string()))
    }

    async fn find_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self.lock()?.memberships.get(&(group_id, user_id)).copied())
    }

    async fn list_members(&self, group_id: Uuid) -> Result<Vec<Member>, StoreError> {
        let t = self.lock()?;
        let members = t
            .memberships
            .values()
            .filter(|m| m.group_id == group_id)
            .filter_map(|m| {
                t.users.get(&m.user_id).map(|user| Member {
                    user: user.clone(),
                    admin: m.admin,
                })
            })
            .collect();
        Ok(sorted_by(members, |m: &Member| m.user.dom_name.clone()))
    }

    async fn list_user_groups(&self, user_id: Uuid) -> Result<Vec<GroupMembership>, StoreError> {
        let t = self.lock()?;
        let groups = t
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                t.groups.get(&m.group_id).map(|group| GroupMembership {
                    group: group.clone(),
                    admin: m.admin,
                })
            })
            .collect();
        Ok(sorted_by(groups, |g: &GroupMembership| g.group.name.clone()))
    }

    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        let mut t = self.lock()?;
        if t.accounts.values().any(|a| a.name == account.name) {
            return Err(StoreError::Conflict(format!("account '{}'", account.name)));
        }
        t.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, StoreError> {
        let t = self.lock()?;
        let accounts = t
            .accounts
            .values()
            .filter(|a| match filter.member {
                None => true,
                Some(user_id) => t
                    .account_users
                    .get(&(a.id, user_id))
                    .is_some_and(|row| row.admin || !filter.admin_only),
            })
            .cloned()
            .collect();
        let mut accounts = sorted_by(accounts, |a: &Account| a.name.clone());
        if let Some(limit) = filter.limit {
            accounts.truncate(limit);
        }
        Ok(accounts)
    }

    async fn update_account(&self, id: Uuid, patch: &AccountPatch) -> Result<Account, StoreError> {
        let mut t = self.lock()?;
        let account = t
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("account".to_string()))?;
        if let Some(active) = patch.active {
            account.active = active;
        }
        if let Some(pi) = &patch.principal_investigator {
            account.principal_investigator = Some(pi.clone());
        }
        if let Some(faculty) = &patch.faculty {
            account.faculty = Some(faculty.clone());
        }
        if let Some(department) = &patch.department {
            account.department = Some(department.clone());
        }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn insert_account_user(&self, row: AccountUser) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if !t.accounts.contains_key(&row.account_id) {
            return Err(StoreError::NotFound("account".to_string()));
        }
        if !t.users.contains_key(&row.user_id) {
            return Err(StoreError::NotFound("user".to_string()));
        }
        let key = (row.account_id, row.user_id);
        if t.account_users.contains_key(&key) {
            return Err(StoreError::Conflict("account user".to_string()));
        }
        t.account_users.insert(key, row);
        Ok(())
    }

    async fn delete_account_user(&self, account_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        self.lock()?
            .account_users
            .remove(&(account_id, user_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("account user".to_string()))
    }

    async fn find_account_user(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccountUser>, StoreError> {
        Ok(self.lock()?.account_users.get(&(account_id, user_id)).copied())
    }

    async fn list_account_users(&self, account_id: Uuid) -> Result<Vec<AccountMember>, StoreError> {
        let t = self.lock()?;
        let members = t
            .account_users
            .values()
            .filter(|row| row.account_id == account_id)
            .filter_map(|row| {
                t.users.get(&row.user_id).map(|user| AccountMember {
                    user: user.clone(),
                    admin: row.admin,
                })
            })
            .collect();
        Ok(sorted_by(members, |m: &AccountMember| m.user.dom_name.clone()))
    }

    async fn insert_service(&self, service: Service) -> Result<Service, StoreError> {
        let mut t = self.lock()?;
        if t.services.values().any(|s| s.name == service.name) {
            return Err(StoreError::Conflict(format!("service '{}'", service.name)));
        }
        if t.services.values().any(|s| s.access == service.access) {
            return Err(StoreError::Conflict("service access code".to_string()));
        }
        t.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn find_service_by_access(&self, access: &str) -> Result<Option<Service>, StoreError> {
        Ok(self
            .lock()?
            .services
            .values()
            .find(|s| s.access == access)
            .cloned())
    }

    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        let services = self.lock()?.services.values().cloned().collect();
        Ok(sorted_by(services, |s: &Service| s.name.clone()))
    }

    async fn delete_service(&self, name: &str) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        let id = t
            .services
            .values()
            .find(|s| s.name == name)
            .map(|s| s.id)
            .ok_or_else(|| StoreError::NotFound(format!("service '{}'", name)))?;
        t.services.remove(&id);
        Ok(())
    }

    async fn insert_resource(&self, resource: Resource) -> Result<Resource, StoreError> {
        let mut t = self.lock()?;
        if t.resources.values().any(|r| r.name == resource.name) {
            return Err(StoreError::Conflict(format!("resource '{}'", resource.name)));
        }
        t.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn find_resource_by_id(&self, id: Uuid) -> Result<Option<Resource>, StoreError> {
        Ok(self.lock()?.resources.get(&id).cloned())
    }

    async fn find_resource_by_name(&self, name: &str) -> Result<Option<Resource>, StoreError> {
        Ok(self
            .lock()?
            .resources
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        let resources = self.lock()?.resources.values().cloned().collect();
        Ok(sorted_by(resources, |r: &Resource| r.name.clone()))
    }

    async fn update_resource(
        &self,
        id: Uuid,
        patch: &ResourcePatch,
    ) -> Result<Resource, StoreError> {
        let mut t = self.lock()?;
        if let Some(name) = &patch.name {
            if t.resources.values().any(|r| r.id != id && &r.name == name) {
                return Err(StoreError::Conflict(format!("resource '{}'", name)));
            }
        }
        let resource = t
            .resources
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("resource".to_string()))?;
        if let Some(name) = &patch.name {
            resource.name = name.clone();
        }
        if let Some(active) = patch.active {
            resource.active = active;
        }
        resource.updated_at = Utc::now();
        Ok(resource.clone())
    }

    async fn list_resource_groups(&self, resource_id: Uuid) -> Result<Vec<Group>, StoreError> {
        let t = self.lock()?;
        let groups = t
            .resource_groups
            .iter()
            .filter(|(r, _)| *r == resource_id)
            .filter_map(|(_, g)| t.groups.get(g).cloned())
            .collect();
        Ok(sorted_by(groups, |g: &Group| g.name.clone()))
    }

    async fn add_resource_group(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        if !t.resources.contains_key(&resource_id) {
            return Err(StoreError::NotFound("resource".to_string()));
        }
        if !t.groups.contains_key(&group_id) {
            return Err(StoreError::NotFound("group".to_string()));
        }
        if !t.resource_groups.insert((resource_id, group_id)) {
            return Err(StoreError::Conflict("resource group association".to_string()));
        }
        Ok(())
    }

    async fn remove_resource_group(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> Result<(), StoreError> {
        if self.lock()?.resource_groups.remove(&(resource_id, group_id)) {
            Ok(())
        } else {
            Err(StoreError::NotFound("resource group association".to_string()))
        }
    }

    async fn insert_usage(&self, records: Vec<ResourceUsage>) -> Result<usize, StoreError> {
        let mut t = self.lock()?;
        for record in &records {
            if !t.resources.contains_key(&record.resource_id) {
                return Err(StoreError::NotFound("resource".to_string()));
            }
            if !t.users.contains_key(&record.user_id) {
                return Err(StoreError::NotFound("user".to_string()));
            }
        }
        let count = records.len();
        t.usage.extend(records);
        Ok(count)
    }

    async fn list_usage(&self, filter: UsageFilter) -> Result<Vec<ResourceUsage>, StoreError> {
        let usage = self
            .lock()?
            .usage
            .iter()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        Ok(sorted_by(usage, |u: &ResourceUsage| u.start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn user(dom_name: &str, logon_name: &str) -> User {
        User::new(
            dom_name.to_string(),
            "Test User".to_string(),
            logon_name.to_string(),
            "JBSWY3DPEHPK3PXP".to_string(),
        )
    }

    #[tokio::test]
    async fn concurrent_membership_inserts_yield_one_conflict() {
        let store = Arc::new(MemoryCredentialStore::new());
        let u = store.insert_user(user("a@x", "a.x")).await.unwrap();
        let g = store
            .insert_group(Group::new("physics".to_string(), true, None))
            .await
            .unwrap();

        let membership = Membership {
            group_id: g.id,
            user_id: u.id,
            admin: false,
        };
        let (first, second) = tokio::join!(
            store.insert_membership(membership),
            store.insert_membership(membership)
        );

        let conflicts = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Conflict(_))))
            .count();
        assert_eq!(conflicts, 1);
        assert!(first.is_ok() || second.is_ok());
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_memberships() {
        let store = MemoryCredentialStore::new();
        let u = store.insert_user(user("a@x", "a.x")).await.unwrap();
        let g = store
            .insert_group(Group::new("physics".to_string(), true, Some(u.id)))
            .await
            .unwrap();
        store
            .insert_membership(Membership {
                group_id: g.id,
                user_id: u.id,
                admin: true,
            })
            .await
            .unwrap();

        let a = store
            .insert_account(Account::new("physics-lab".to_string(), true))
            .await
            .unwrap();
        store
            .insert_account_user(AccountUser {
                account_id: a.id,
                user_id: u.id,
                admin: false,
            })
            .await
            .unwrap();

        store.delete_user(u.id).await.unwrap();

        assert!(store.find_membership(g.id, u.id).await.unwrap().is_none());
        assert!(store.list_account_users(a.id).await.unwrap().is_empty());
        assert!(store.list_members(g.id).await.unwrap().is_empty());
        let group = store.find_group(&GroupRef::Id(g.id)).await.unwrap().unwrap();
        assert_eq!(group.owner_id, None);
    }

    #[tokio::test]
    async fn account_listing_narrows_to_members_and_admins() {
        let store = MemoryCredentialStore::new();
        let u = store.insert_user(user("a@x", "a.x")).await.unwrap();
        let lab = store
            .insert_account(Account::new("lab".to_string(), true))
            .await
            .unwrap();
        let chair = store
            .insert_account(Account::new("chair".to_string(), true))
            .await
            .unwrap();
        store
            .insert_account(Account::new("other".to_string(), true))
            .await
            .unwrap();
        for (account, admin) in [(&lab, false), (&chair, true)] {
            store
                .insert_account_user(AccountUser {
                    account_id: account.id,
                    user_id: u.id,
                    admin,
                })
                .await
                .unwrap();
        }

        let mine = AccountFilter {
            member: Some(u.id),
            ..Default::default()
        };
        let names: Vec<String> = store
            .list_accounts(mine)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, ["chair", "lab"]);

        let administered = AccountFilter {
            admin_only: true,
            ..mine
        };
        let accounts = store.list_accounts(administered).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, chair.id);

        let page = AccountFilter {
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(store.list_accounts(page).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unique_keys_conflict() {
        let store = MemoryCredentialStore::new();
        store.insert_user(user("a@x", "a.x")).await.unwrap();
        assert!(matches!(
            store.insert_user(user("a@x", "b.x")).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.insert_user(user("b@x", "a.x")).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn numeric_ids_are_assigned_in_order() {
        let store = MemoryCredentialStore::new();
        let a = store.insert_user(user("a@x", "a.x")).await.unwrap();
        let b = store.insert_user(user("b@x", "b.x")).await.unwrap();
        assert_eq!(a.numeric_id + 1, b.numeric_id);
    }

    #[tokio::test]
    async fn usage_batches_are_all_or_nothing() {
        let store = MemoryCredentialStore::new();
        let u = store.insert_user(user("a@x", "a.x")).await.unwrap();
        let r = store
            .insert_resource(Resource::new("cluster".to_string(), true))
            .await
            .unwrap();
        let now = Utc::now();

        let batch = vec![
            ResourceUsage::new(r.id, u.id, now, now, Default::default()),
            ResourceUsage::new(r.id, Uuid::new_v4(), now, now, Default::default()),
        ];
        assert!(store.insert_usage(batch).await.is_err());

        let filter = UsageFilter {
            resource_id: r.id,
            user_id: None,
            start: None,
            end: None,
        };
        assert!(store.list_usage(filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn logon_names_like_matches_candidate_and_suffixes() {
        let store = MemoryCredentialStore::new();
        store.insert_user(user("a@x", "jadoe.example")).await.unwrap();
        store.insert_user(user("b@x", "jadoe.example.0")).await.unwrap();
        store.insert_user(user("c@x", "jadoexample")).await.unwrap();

        let names = store.logon_names_like("jadoe.example").await.unwrap();
        assert_eq!(names.len(), 2);
        assert!(!names.contains("jadoexample"));
    }
}
