use uuid::Uuid;

use super::AccountingService;
use crate::dtos::resources::CreateResourceRequest;
use crate::models::{Group, GroupRef, Principal, Resource, ResourcePatch};
use crate::services::authz::{Action, Scope};
use crate::services::error::ServiceError;

impl AccountingService {
    pub async fn list_resources(&self, principal: &Principal) -> Result<Vec<Resource>, ServiceError> {
        self.require(principal, Action::ManageResources, Scope::Global).await?;
        Ok(self.store.run(|s| s.list_resources()).await?)
    }

    pub async fn create_resource(
        &self,
        principal: &Principal,
        req: CreateResourceRequest,
    ) -> Result<Resource, ServiceError> {
        self.require(principal, Action::ManageResources, Scope::Global).await?;

        let resource = Resource::new(req.name, req.active);
        let resource = self.store.run(|s| s.insert_resource(resource)).await?;
        tracing::info!(actor = %principal.name, target = %resource.name, "Resource created");
        Ok(resource)
    }

    pub async fn update_resource(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: ResourcePatch,
    ) -> Result<Resource, ServiceError> {
        self.require(principal, Action::ManageResources, Scope::Global).await?;
        if patch.is_empty() {
            return Err(ServiceError::Validation("Nothing to update".to_string()));
        }

        let resource = self.store.run(|s| s.update_resource(id, &patch)).await?;
        tracing::info!(actor = %principal.name, target = %resource.name, "Resource updated");
        Ok(resource)
    }

    pub async fn list_resource_groups(&self, principal: &Principal, id: Uuid) -> Result<Vec<Group>, ServiceError> {
        self.require(principal, Action::ManageResources, Scope::Global).await?;

        let resource = self.resource(id).await?;
        Ok(self.store.run(|s| s.list_resource_groups(resource.id)).await?)
    }

    pub async fn add_resource_group(
        &self,
        principal: &Principal,
        id: Uuid,
        group: &GroupRef,
    ) -> Result<(), ServiceError> {
        self.require(principal, Action::ManageResources, Scope::Global).await?;

        let resource = self.resource(id).await?;
        let group = self.group(group).await?;
        self.store
            .run(|s| s.add_resource_group(resource.id, group.id))
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => ServiceError::Conflict(format!(
                    "'{}' is already associated with '{}'",
                    group.name, resource.name
                )),
                other => other,
            })?;

        tracing::info!(actor = %principal.name, target = %resource.name, group = %group.name, "Resource group added");
        Ok(())
    }

    pub async fn remove_resource_group(
        &self,
        principal: &Principal,
        id: Uuid,
        group: &GroupRef,
    ) -> Result<(), ServiceError> {
        self.require(principal, Action::ManageResources, Scope::Global).await?;

        let resource = self.resource(id).await?;
        let group = self.group(group).await?;
        self.store
            .run(|s| s.remove_resource_group(resource.id, group.id))
            .await?;

        tracing::info!(actor = %principal.name, target = %resource.name, group = %group.name, "Resource group removed");
        Ok(())
    }

    async fn resource(&self, id: Uuid) -> Result<Resource, ServiceError> {
        self.store
            .run(|s| s.find_resource_by_id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound("resource".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::accounting;
    use super::*;
    use crate::dtos::groups::CreateGroupRequest;

    #[tokio::test]
    async fn resource_group_associations() {
        let svc = accounting();
        let root = Principal::super_admin();
        let cluster = svc
            .create_resource(&root, CreateResourceRequest { name: "cluster".into(), active: true })
            .await
            .unwrap();
        svc.create_group(&root, CreateGroupRequest { name: "physics".into(), active: true, owner: None })
            .await
            .unwrap();
        let physics = GroupRef::Name("physics".into());

        svc.add_resource_group(&root, cluster.id, &physics).await.unwrap();
        assert!(matches!(
            svc.add_resource_group(&root, cluster.id, &physics).await,
            Err(ServiceError::Conflict(_))
        ));
        let groups = svc.list_resource_groups(&root, cluster.id).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "physics");

        svc.remove_resource_group(&root, cluster.id, &physics).await.unwrap();
        assert!(matches!(
            svc.remove_resource_group(&root, cluster.id, &physics).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resource_patch_and_permissions() {
        let svc = accounting();
        let root = Principal::super_admin();
        let cluster = svc
            .create_resource(&root, CreateResourceRequest { name: "cluster".into(), active: true })
            .await
            .unwrap();

        let patched = svc
            .update_resource(&root, cluster.id, ResourcePatch { name: None, active: Some(false) })
            .await
            .unwrap();
        assert!(!patched.active);
        assert_eq!(patched.name, "cluster");

        let service = Principal::service(Uuid::new_v4(), "cluster");
        assert!(matches!(
            svc.list_resources(&service).await,
            Err(ServiceError::AuthorizationDenied)
        ));
        assert!(matches!(
            svc.update_resource(&root, Uuid::new_v4(), ResourcePatch { name: Some("x".into()), active: None }).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
