//! Session lifecycle: login, bearer validation and logout. One current token
//! per principal; issuing a new one supersedes the old.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;

use super::error::ServiceError;
use super::jwt::{JwtService, TokenError};
use super::metrics;
use super::provisioning::provision_user;
use super::session_store::{SessionRecord, SessionStore};
use crate::config::AccountingConfig;
use crate::identity::{in_any_group, DirectoryMatch, IdentityProvider};
use crate::models::{normalize_dom_name, Principal, User};
use crate::secrets::{verify_presented_digest, verify_secret};
use crate::store::StoreHandle;

/// Login inputs that come from configuration.
#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub admin_access: String,
    pub admin_secret: String,
    pub administrator_groups: Vec<String>,
    pub auto_provision: bool,
    pub deadline: Duration,
}

impl LoginSettings {
    pub fn from_config(config: &AccountingConfig) -> Self {
        Self {
            admin_access: config.admin.access.clone(),
            admin_secret: config.admin.secret.clone(),
            administrator_groups: config.identity.administrator_groups.clone(),
            auto_provision: config.identity.auto_provision,
            deadline: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_in: i64,
    /// The caller already held the current token; nothing was rotated.
    pub already_active: bool,
    pub principal: Principal,
}

#[derive(Clone)]
pub struct SessionManager {
    jwt: JwtService,
    sessions: Arc<dyn SessionStore>,
    store: StoreHandle,
    provider: Arc<dyn IdentityProvider>,
    settings: LoginSettings,
}

fn tokens_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

impl SessionManager {
    pub fn new(
        jwt: JwtService,
        sessions: Arc<dyn SessionStore>,
        store: StoreHandle,
        provider: Arc<dyn IdentityProvider>,
        settings: LoginSettings,
    ) -> Self {
        Self {
            jwt,
            sessions,
            store,
            provider,
            settings,
        }
    }

    async fn session_call<'a, T, Fut>(
        &'a self,
        call: impl FnOnce(&'a dyn SessionStore) -> Fut,
    ) -> Result<T, ServiceError>
    where
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        match tokio::time::timeout(self.settings.deadline, call(self.sessions.as_ref())).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Session store call failed");
                Err(ServiceError::UpstreamUnavailable("session store".to_string()))
            }
            Err(_) => {
                tracing::warn!("Session store call timed out");
                Err(ServiceError::UpstreamUnavailable("session store".to_string()))
            }
        }
    }

    /// Verifies the credentials and opens a session. When `presented` is
    /// already the current token of the same principal it is returned as is.
    pub async fn login(
        &self,
        username: &str,
        secret: &str,
        presented: Option<&str>,
    ) -> Result<LoginOutcome, ServiceError> {
        let principal = match self.authenticate(username, secret).await {
            Ok(principal) => principal,
            Err(e) => {
                let outcome = match e {
                    ServiceError::AuthenticationFailure => "failure",
                    _ => "error",
                };
                metrics::record_login(outcome, "unknown");
                return Err(e);
            }
        };
        let key = principal.session_key();
        let kind = principal.identity.kind();

        if let Some(presented) = presented {
            let current = self.session_call(|s| s.get(&key)).await?;
            if let Some(record) = current {
                if tokens_equal(&record.token, presented) && record.expires_at > Utc::now().timestamp() {
                    metrics::record_login("already_active", kind);
                    tracing::info!(actor = %principal.name, kind, "Login with current token, reusing session");
                    return Ok(LoginOutcome {
                        token: record.token,
                        expires_in: record.expires_at - Utc::now().timestamp(),
                        already_active: true,
                        principal: record.principal,
                    });
                }
            }
        }

        let (token, claims) = self.jwt.issue(&key, kind)?;
        let record = SessionRecord {
            token: token.clone(),
            principal: principal.clone(),
            expires_at: claims.exp,
        };
        let ttl = self.jwt.lifetime_seconds();
        self.session_call(|s| s.put(&key, &record, ttl)).await?;

        metrics::record_login("success", kind);
        tracing::info!(actor = %principal.name, kind, "Login succeeded");

        Ok(LoginOutcome {
            token,
            expires_in: ttl,
            already_active: false,
            principal,
        })
    }

    /// Tries the sentinel admin, then services, then the identity provider.
    async fn authenticate(&self, username: &str, secret: &str) -> Result<Principal, ServiceError> {
        if username.is_empty() || secret.is_empty() {
            return Err(ServiceError::AuthenticationFailure);
        }

        if username == self.settings.admin_access
            && verify_presented_digest(secret, &self.settings.admin_secret)
        {
            return Ok(Principal::super_admin());
        }

        if let Some(service) = self.store.run(|s| s.find_service_by_access(username)).await? {
            if verify_secret(secret, &service.secret_digest) {
                return Ok(Principal::service(service.id, service.name));
            }
            tracing::warn!(service = %service.name, "Service secret mismatch");
        }

        let verified = tokio::time::timeout(
            self.settings.deadline,
            self.provider.verify(username, secret),
        )
        .await
        .map_err(|_| {
            tracing::warn!(provider = self.provider.name(), "Identity provider timed out");
            ServiceError::UpstreamUnavailable("identity provider".to_string())
        })??;

        match verified {
            Some(found) => self.resolve_user(found).await,
            None => {
                tracing::info!(username = %username, "Login rejected");
                Err(ServiceError::AuthenticationFailure)
            }
        }
    }

    /// Directory names are case-insensitive; every provider's answer is
    /// folded to one `dom_name` (and so one session key) here.
    async fn resolve_user(&self, mut found: DirectoryMatch) -> Result<Principal, ServiceError> {
        found.username = normalize_dom_name(&found.username);
        let directory_admin = in_any_group(&found.groups, &self.settings.administrator_groups);
        let user = match self.find_or_provision(&found).await? {
            Some(user) => user,
            None => {
                tracing::warn!(
                    username = %found.username,
                    "Identity verified but no user record exists"
                );
                return Err(ServiceError::AuthenticationFailure);
            }
        };

        Ok(Principal::user(user.id, user.dom_name, directory_admin))
    }

    async fn find_or_provision(&self, found: &DirectoryMatch) -> Result<Option<User>, ServiceError> {
        let dom_name = found.username.as_str();
        if let Some(user) = self.store.run(|s| s.find_user_by_dom_name(dom_name)).await? {
            return Ok(Some(user));
        }
        if !self.settings.auto_provision {
            return Ok(None);
        }

        let full_name = found.full_name.as_deref().unwrap_or(dom_name);
        match provision_user(&self.store, dom_name, full_name).await {
            Ok(user) => Ok(Some(user)),
            // Provisioned by a concurrent login in the meantime.
            Err(ServiceError::Conflict(_)) => Ok(self.store.run(|s| s.find_user_by_dom_name(dom_name)).await?),
            Err(ServiceError::Validation(reason)) => {
                tracing::warn!(username = %dom_name, reason = %reason, "Cannot provision user");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolves a bearer token to its principal. Only the current token of
    /// a session validates; an expired one purges that session.
    pub async fn validate(&self, token: &str) -> Result<Principal, ServiceError> {
        let claims = match self.jwt.decode(token) {
            Ok(claims) => claims,
            Err(TokenError::Expired(claims)) => {
                match self.session_call(|s| s.remove_if_current(&claims.sub, token)).await {
                    Ok(true) => tracing::debug!(subject = %claims.sub, "Expired session purged"),
                    Ok(false) => {}
                    Err(e) => tracing::warn!(subject = %claims.sub, error = %e, "Failed to purge expired session"),
                }
                return Err(ServiceError::AuthenticationFailure);
            }
            Err(TokenError::Invalid) => return Err(ServiceError::AuthenticationFailure),
        };

        let record = self
            .session_call(|s| s.get(&claims.sub))
            .await?
            .ok_or(ServiceError::AuthenticationFailure)?;

        if !tokens_equal(&record.token, token) {
            tracing::debug!(subject = %claims.sub, "Superseded token presented");
            return Err(ServiceError::AuthenticationFailure);
        }

        Ok(record.principal)
    }

    /// Ends the session under `session_key`, whatever token it holds.
    pub async fn logout(&self, session_key: &str) -> Result<(), ServiceError> {
        self.session_call(|s| s.remove(session_key)).await?;
        tracing::info!(subject = %session_key, "Session ended");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.session_call(|s| s.health_check()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::identity::ProviderError;
    use crate::models::{Identity, Service};
    use crate::secrets::digest_secret;
    use crate::services::session_store::MemorySessionStore;
    use crate::store::MemoryCredentialStore;
    use async_trait::async_trait;

    /// Accepts `alice`/`wonderland` in any case, reporting the given groups
    /// and echoing the username as typed, like a directory bind does.
    struct StaticProvider {
        groups: Vec<String>,
    }

    #[async_trait]
    impl IdentityProvider for StaticProvider {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn verify(&self, username: &str, password: &str) -> Result<Option<DirectoryMatch>, ProviderError> {
            if username.eq_ignore_ascii_case("alice@example.org") && password == "wonderland" {
                return Ok(Some(DirectoryMatch {
                    username: username.to_string(),
                    full_name: Some("Alice Liddell".to_string()),
                    groups: self.groups.clone(),
                }));
            }
            Ok(None)
        }
    }

    struct StalledProvider;

    #[async_trait]
    impl IdentityProvider for StalledProvider {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn verify(&self, _: &str, _: &str) -> Result<Option<DirectoryMatch>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    struct Harness {
        manager: SessionManager,
        store: StoreHandle,
        sessions: Arc<MemorySessionStore>,
    }

    fn harness_with(provider: Arc<dyn IdentityProvider>, lifetime_seconds: i64, auto_provision: bool) -> Harness {
        let store = StoreHandle::new(Arc::new(MemoryCredentialStore::new()), Duration::from_millis(200));
        let sessions = Arc::new(MemorySessionStore::new());
        let jwt = JwtService::new(&TokenConfig {
            secret: "0123456789abcdef0123456789abcdef".to_string(),
            issuer: "accounting-test".to_string(),
            lifetime_seconds,
            algorithm: "HS256".to_string(),
        })
        .unwrap();
        let settings = LoginSettings {
            admin_access: "root".to_string(),
            admin_secret: "root-secret".to_string(),
            administrator_groups: vec!["hpc-admins".to_string()],
            auto_provision,
            deadline: Duration::from_millis(200),
        };
        let manager = SessionManager::new(jwt, sessions.clone(), store.clone(), provider, settings);
        Harness {
            manager,
            store,
            sessions,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(StaticProvider { groups: vec![] }), 3600, true)
    }

    fn admin_password() -> String {
        digest_secret("root-secret")
    }

    #[tokio::test]
    async fn admin_logs_in_with_the_secret_digest() {
        let h = harness();
        let outcome = h.manager.login("root", &admin_password(), None).await.unwrap();

        assert!(!outcome.already_active);
        assert_eq!(outcome.principal, Principal::super_admin());
        assert_eq!(h.manager.validate(&outcome.token).await.unwrap(), Principal::super_admin());

        let err = h.manager.login("root", "root-secret", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::AuthenticationFailure));
    }

    #[tokio::test]
    async fn services_log_in_with_access_and_secret() {
        let h = harness();
        let service = Service::new("slurm".into(), "ACCESS123".into(), digest_secret("svc-secret"));
        h.store.run(|s| s.insert_service(service)).await.unwrap();

        let outcome = h.manager.login("ACCESS123", "svc-secret", None).await.unwrap();
        assert!(matches!(outcome.principal.identity, Identity::Service(_)));
        assert_eq!(outcome.principal.session_key(), "service:slurm");

        let err = h.manager.login("ACCESS123", "nope", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::AuthenticationFailure));
    }

    #[tokio::test]
    async fn provider_logins_provision_users() {
        let h = harness();
        let outcome = h.manager.login("alice@example.org", "wonderland", None).await.unwrap();

        let user = h
            .store
            .run(|s| s.find_user_by_dom_name("alice@example.org"))
            .await
            .unwrap()
            .expect("user provisioned");
        assert_eq!(outcome.principal.user_id(), Some(user.id));
        assert_eq!(user.full_name, "Alice Liddell");
        assert!(!outcome.principal.directory_admin);

        // second login reuses the record
        h.manager.login("alice@example.org", "wonderland", None).await.unwrap();
        assert_eq!(h.store.run(|s| s.list_users()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn directory_names_are_case_insensitive() {
        let h = harness();
        let shouted = h.manager.login("Alice@Example.ORG", "wonderland", None).await.unwrap();
        assert_eq!(shouted.principal.session_key(), "user:alice@example.org");

        let plain = h.manager.login("alice@example.org", "wonderland", None).await.unwrap();
        assert_eq!(plain.principal.user_id(), shouted.principal.user_id());
        assert_eq!(h.store.run(|s| s.list_users()).await.unwrap().len(), 1);

        // one identity, one current token
        assert!(h.manager.validate(&shouted.token).await.is_err());
        assert!(h.manager.validate(&plain.token).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_users_are_rejected_without_provisioning() {
        let h = harness_with(Arc::new(StaticProvider { groups: vec![] }), 3600, false);
        let err = h.manager.login("alice@example.org", "wonderland", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::AuthenticationFailure));
    }

    #[tokio::test]
    async fn administrator_groups_mark_directory_admins() {
        let groups = vec!["CN=HPC-Admins,OU=Groups,DC=example,DC=org".to_string()];
        let h = harness_with(Arc::new(StaticProvider { groups }), 3600, true);

        let outcome = h.manager.login("alice@example.org", "wonderland", None).await.unwrap();
        assert!(outcome.principal.directory_admin);
        assert!(h.manager.validate(&outcome.token).await.unwrap().directory_admin);
    }

    #[tokio::test]
    async fn a_new_login_supersedes_the_previous_token() {
        let h = harness();
        let first = h.manager.login("root", &admin_password(), None).await.unwrap();
        let second = h.manager.login("root", &admin_password(), None).await.unwrap();

        assert_ne!(first.token, second.token);
        assert!(matches!(
            h.manager.validate(&first.token).await,
            Err(ServiceError::AuthenticationFailure)
        ));
        assert!(h.manager.validate(&second.token).await.is_ok());
    }

    #[tokio::test]
    async fn presenting_the_current_token_reuses_it() {
        let h = harness();
        let first = h.manager.login("root", &admin_password(), None).await.unwrap();
        let again = h
            .manager
            .login("root", &admin_password(), Some(&first.token))
            .await
            .unwrap();

        assert!(again.already_active);
        assert_eq!(again.token, first.token);
        assert!(h.manager.validate(&first.token).await.is_ok());
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected_and_purged() {
        let h = harness_with(Arc::new(StaticProvider { groups: vec![] }), 0, true);
        let outcome = h.manager.login("root", &admin_password(), None).await.unwrap();
        assert!(h.sessions.get("admin").await.unwrap().is_some());

        assert!(matches!(
            h.manager.validate(&outcome.token).await,
            Err(ServiceError::AuthenticationFailure)
        ));
        assert!(h.sessions.get("admin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_invalidates_and_is_idempotent() {
        let h = harness();
        let outcome = h.manager.login("root", &admin_password(), None).await.unwrap();

        h.manager.logout("admin").await.unwrap();
        h.manager.logout("admin").await.unwrap();
        assert!(h.manager.validate(&outcome.token).await.is_err());
    }

    #[tokio::test]
    async fn stalled_provider_is_unavailable() {
        let h = harness_with(Arc::new(StalledProvider), 3600, true);
        let err = h.manager.login("bob", "pw", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn garbage_tokens_fail_authentication() {
        let h = harness();
        assert!(matches!(
            h.manager.validate("garbage").await,
            Err(ServiceError::AuthenticationFailure)
        ));
    }
}
