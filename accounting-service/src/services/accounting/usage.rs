use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use super::AccountingService;
use crate::dtos::usage::{UsageQuery, UsageRecordRequest};
use crate::models::{normalize_dom_name, Principal, Resource, ResourceUsage, UsageFilter};
use crate::services::authz::{Action, Scope};
use crate::services::error::ServiceError;

impl AccountingService {
    /// Inserts a batch of usage records, all or none. A service may only
    /// record usage for the resource named after it, with explicit windows;
    /// super-admins may omit the window, which then defaults to now.
    pub async fn insert_usage(
        &self,
        principal: &Principal,
        records: Vec<UsageRecordRequest>,
    ) -> Result<usize, ServiceError> {
        self.require(principal, Action::InsertUsage, Scope::Global).await?;
        let is_admin = self.authz.is_super_admin(principal).await?;

        if !is_admin {
            if records.iter().any(|r| r.resource != principal.name) {
                tracing::warn!(actor = %principal.name, "Usage batch names a foreign resource");
                return Err(ServiceError::AuthorizationDenied);
            }
            if records.iter().any(|r| r.start.is_none() || r.end.is_none()) {
                return Err(ServiceError::Validation(
                    "Every record needs a start and an end".to_string(),
                ));
            }
        }

        let mut resources: HashMap<String, Uuid> = HashMap::new();
        let mut users: HashMap<String, Uuid> = HashMap::new();
        let mut batch = Vec::with_capacity(records.len());

        for record in records {
            let resource_id = match resources.get(&record.resource) {
                Some(id) => *id,
                None => {
                    let id = self.resource_by_name(&record.resource).await?.id;
                    resources.insert(record.resource.clone(), id);
                    id
                }
            };
            let user_id = match users.get(&record.user) {
                Some(id) => *id,
                None => {
                    let id = self.user_by_dom_name(&record.user).await?.id;
                    users.insert(record.user.clone(), id);
                    id
                }
            };

            let now = Utc::now();
            let start = record.start.unwrap_or(now);
            let end = record.end.unwrap_or(start.max(now));
            if end < start {
                return Err(ServiceError::Validation(format!(
                    "Record for '{}' ends before it starts",
                    record.user
                )));
            }

            batch.push(ResourceUsage::new(resource_id, user_id, start, end, record.metrics));
        }

        let inserted = self.store.run(|s| s.insert_usage(batch)).await?;
        tracing::info!(actor = %principal.name, inserted, "Usage recorded");
        Ok(inserted)
    }

    /// Super-admins read anything; users read their own usage, or that of
    /// members of a group they administer which is tied to the resource.
    pub async fn list_usage(
        &self,
        principal: &Principal,
        query: UsageQuery,
    ) -> Result<Vec<ResourceUsage>, ServiceError> {
        if self.authz.is_super_admin(principal).await? {
            self.require(principal, Action::ReadUsage, Scope::Global).await?;

            let resource = self.resource_by_name(&query.resource).await?;
            let user_id = match &query.user {
                Some(dom_name) => Some(self.user_by_dom_name(dom_name).await?.id),
                None => None,
            };
            return self.query_usage(resource.id, user_id, &query).await;
        }

        let Some(caller) = principal.user_id() else {
            self.require(principal, Action::ReadUsage, Scope::Global).await?;
            return Err(ServiceError::AuthorizationDenied);
        };

        // Unknown names are denied, not reported missing.
        let Some(resource) = self
            .store
            .run(|s| s.find_resource_by_name(&query.resource))
            .await?
        else {
            return Err(self.missing(principal, "resource").await);
        };
        let target = match &query.user {
            Some(dom_name) => {
                let key = normalize_dom_name(dom_name);
                match self.store.run(|s| s.find_user_by_dom_name(&key)).await? {
                    Some(user) => user.id,
                    None => return Err(self.missing(principal, "user").await),
                }
            }
            None => caller,
        };

        self.require(
            principal,
            Action::ReadUsage,
            Scope::Usage {
                resource_id: resource.id,
                user_id: target,
            },
        )
        .await?;

        self.query_usage(resource.id, Some(target), &query).await
    }

    async fn query_usage(
        &self,
        resource_id: Uuid,
        user_id: Option<Uuid>,
        query: &UsageQuery,
    ) -> Result<Vec<ResourceUsage>, ServiceError> {
        let filter = UsageFilter {
            resource_id,
            user_id,
            start: query.start,
            end: query.end,
        };
        Ok(self.store.run(|s| s.list_usage(filter)).await?)
    }

    async fn resource_by_name(&self, name: &str) -> Result<Resource, ServiceError> {
        self.store
            .run(|s| s.find_resource_by_name(name))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("resource '{}'", name)))
    }
}
