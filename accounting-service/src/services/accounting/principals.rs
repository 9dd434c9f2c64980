//! Service principals.

use super::AccountingService;
use crate::dtos::services::CreateServiceRequest;
use crate::models::{service_session_key, CreatedService, Principal, Service, ServiceSummary};
use crate::secrets::{digest_secret, generate_access_code, generate_secret};
use crate::services::authz::{Action, Scope};
use crate::services::error::ServiceError;

impl AccountingService {
    pub async fn list_services(&self, principal: &Principal) -> Result<Vec<ServiceSummary>, ServiceError> {
        self.require(principal, Action::ManageServices, Scope::Global).await?;

        let services = self.store.run(|s| s.list_services()).await?;
        Ok(services.into_iter().map(ServiceSummary::from).collect())
    }

    /// Returns the plaintext secret; only its digest is stored.
    pub async fn create_service(
        &self,
        principal: &Principal,
        req: CreateServiceRequest,
    ) -> Result<CreatedService, ServiceError> {
        self.require(principal, Action::ManageServices, Scope::Global).await?;

        let secret = generate_secret();
        let service = Service::new(req.name, generate_access_code(), digest_secret(&secret));
        let service = self.store.run(|s| s.insert_service(service)).await?;

        tracing::info!(actor = %principal.name, target = %service.name, "Service created");
        Ok(CreatedService {
            id: service.id,
            name: service.name,
            access: service.access,
            secret,
        })
    }

    pub async fn delete_service(&self, principal: &Principal, name: &str) -> Result<(), ServiceError> {
        self.require(principal, Action::ManageServices, Scope::Global).await?;

        self.store.run(|s| s.delete_service(name)).await?;
        self.sessions.logout(&service_session_key(name)).await?;

        tracing::info!(actor = %principal.name, target = %name, "Service deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::accounting;
    use super::*;
    use crate::secrets::verify_secret;

    #[tokio::test]
    async fn secret_is_shown_once_and_stored_as_digest() {
        let svc = accounting();
        let root = Principal::super_admin();
        let created = svc
            .create_service(&root, CreateServiceRequest { name: "slurm".into() })
            .await
            .unwrap();
        assert_eq!(created.secret.len(), 24);

        let stored = svc
            .store
            .run(|s| s.find_service_by_access(&created.access))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.secret_digest, created.secret);
        assert!(verify_secret(&created.secret, &stored.secret_digest));

        let listed = serde_json::to_string(&svc.list_services(&root).await.unwrap()).unwrap();
        assert!(listed.contains("slurm"));
        assert!(!listed.contains(&created.secret));
        assert!(!listed.contains(&stored.secret_digest));
    }

    #[tokio::test]
    async fn deleting_unknown_services_is_not_found() {
        let svc = accounting();
        let root = Principal::super_admin();
        svc.create_service(&root, CreateServiceRequest { name: "slurm".into() })
            .await
            .unwrap();

        svc.delete_service(&root, "slurm").await.unwrap();
        assert!(matches!(
            svc.delete_service(&root, "slurm").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
