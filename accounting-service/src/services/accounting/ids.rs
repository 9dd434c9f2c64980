//! Calls made by services on behalf of users: OTP checks and POSIX id lookups.

use chrono::Utc;
use uuid::Uuid;

use super::AccountingService;
use crate::models::{GroupRef, Principal};
use crate::secrets::totp;
use crate::services::authz::{Action, Scope};
use crate::services::error::ServiceError;

impl AccountingService {
    /// Checks a one-time password for the user with `logon_name`. A wrong
    /// code is an authentication failure; the code itself is never logged.
    pub async fn verify_otp(
        &self,
        principal: &Principal,
        logon_name: &str,
        code: &str,
    ) -> Result<Uuid, ServiceError> {
        self.require(principal, Action::VerifyOtp, Scope::Global).await?;

        let user = self
            .store
            .run(|s| s.find_user_by_logon_name(logon_name))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user '{}'", logon_name)))?;

        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        if !totp::verify(&user.seed, code, now)? {
            tracing::warn!(actor = %principal.name, target = %logon_name, "OTP verification failed");
            return Err(ServiceError::AuthenticationFailure);
        }

        tracing::info!(actor = %principal.name, target = %logon_name, "OTP verified");
        Ok(user.id)
    }

    pub async fn group_gid(&self, principal: &Principal, name: &str) -> Result<i64, ServiceError> {
        self.require(principal, Action::LookupIds, Scope::Global).await?;

        let group = self.group(&GroupRef::Name(name.to_string())).await?;
        Ok(group.numeric_id + self.ids.gid_init)
    }

    pub async fn user_uid(&self, principal: &Principal, logon_name: &str) -> Result<i64, ServiceError> {
        self.require(principal, Action::LookupIds, Scope::Global).await?;

        let user = self
            .store
            .run(|s| s.find_user_by_logon_name(logon_name))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user '{}'", logon_name)))?;
        Ok(user.numeric_id + self.ids.uid_init)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{accounting, principal};
    use super::*;
    use crate::dtos::groups::CreateGroupRequest;
    use crate::dtos::users::CreateUserRequest;

    #[tokio::test]
    async fn otp_verification_for_services() {
        let svc = accounting();
        let jane = svc
            .create_user(
                &Principal::super_admin(),
                CreateUserRequest { dom_name: "jane.doe@example.org".into(), full_name: "Jane".into() },
            )
            .await
            .unwrap();
        let service = Principal::service(Uuid::new_v4(), "login-node");
        let now = Utc::now().timestamp() as u64;
        let seed = svc.me(&principal(&jane)).await.unwrap().seed;
        let code = totp::code_at(&seed, now).unwrap();

        let id = svc.verify_otp(&service, "jadoe.example", &code).await.unwrap();
        assert_eq!(id, jane.user.id);

        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert!(matches!(
            svc.verify_otp(&service, "jadoe.example", wrong).await,
            Err(ServiceError::AuthenticationFailure)
        ));
        assert!(matches!(
            svc.verify_otp(&service, "nobody", &code).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            svc.verify_otp(&principal(&jane), "jadoe.example", &code).await,
            Err(ServiceError::AuthorizationDenied)
        ));
    }

    #[tokio::test]
    async fn numeric_ids_apply_the_configured_offsets() {
        let svc = accounting();
        let root = Principal::super_admin();
        svc.create_group(&root, CreateGroupRequest { name: "physics".into(), active: true, owner: None })
            .await
            .unwrap();
        let jane = svc
            .create_user(&root, CreateUserRequest { dom_name: "jane.doe@example.org".into(), full_name: "Jane".into() })
            .await
            .unwrap();
        let service = Principal::service(Uuid::new_v4(), "nss");

        assert_eq!(svc.group_gid(&service, "physics").await.unwrap(), 10001);
        assert_eq!(
            svc.user_uid(&service, "jadoe.example").await.unwrap(),
            jane.user.numeric_id + 20000
        );
        assert!(matches!(
            svc.group_gid(&service, "chemistry").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
