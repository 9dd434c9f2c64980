//! LDAP / Active Directory provider.
//!
//! Two bind strategies:
//! - with a service account (`bind_dn`): bind as the service, search the
//!   user entry by `login_attr`, then bind as that entry's DN;
//! - without one: bind directly as `username@domain` and read the user's
//!   own entry.

use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use std::time::Duration;

use super::{in_all_groups, DirectoryMatch, IdentityProvider, ProviderError};
use crate::config::DirectoryConfig;

const INVALID_CREDENTIALS: u32 = 49;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const ATTRIBUTES: [&str; 3] = ["memberOf", "displayName", "cn"];

pub struct DirectoryProvider {
    config: DirectoryConfig,
}

fn unavailable(e: LdapError) -> ProviderError {
    ProviderError::Unavailable(e.to_string())
}

fn first_attr(entry: &SearchEntry, name: &str) -> Option<String> {
    entry.attrs.get(name).and_then(|v| v.first()).cloned()
}

impl DirectoryProvider {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Ldap, ProviderError> {
        let settings = LdapConnSettings::new().set_conn_timeout(CONNECT_TIMEOUT);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(unavailable)?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "LDAP connection closed with error");
            }
        });

        Ok(ldap)
    }

    /// `Ok(false)` for rejected credentials, an error for anything that
    /// says nothing about the credentials themselves.
    async fn bind(&self, ldap: &mut Ldap, dn: &str, password: &str) -> Result<bool, ProviderError> {
        let result = ldap.simple_bind(dn, password).await.map_err(unavailable)?;
        match result.rc {
            0 => Ok(true),
            INVALID_CREDENTIALS => Ok(false),
            rc => Err(ProviderError::Unavailable(format!(
                "bind returned rc={} ({})",
                rc, result.text
            ))),
        }
    }

    async fn find_entry(&self, ldap: &mut Ldap, username: &str) -> Result<Option<SearchEntry>, ProviderError> {
        let filter = format!("({}={})", self.config.login_attr, ldap_escape(username));
        let (entries, _) = ldap
            .search(&self.config.search_base, Scope::Subtree, &filter, ATTRIBUTES.to_vec())
            .await
            .map_err(unavailable)?
            .success()
            .map_err(unavailable)?;

        Ok(entries.into_iter().next().map(SearchEntry::construct))
    }

    async fn authenticate(
        &self,
        ldap: &mut Ldap,
        username: &str,
        password: &str,
    ) -> Result<Option<DirectoryMatch>, ProviderError> {
        let entry = match (&self.config.bind_dn, &self.config.bind_password) {
            (Some(bind_dn), Some(bind_password)) => {
                if !self.bind(ldap, bind_dn, bind_password).await? {
                    return Err(ProviderError::Misconfigured(
                        "service account bind rejected".to_string(),
                    ));
                }
                let Some(entry) = self.find_entry(ldap, username).await? else {
                    return Ok(None);
                };
                if !self.bind(ldap, &entry.dn, password).await? {
                    return Ok(None);
                }
                Some(entry)
            }
            _ => {
                let principal = format!("{}@{}", username, self.config.domain);
                if !self.bind(ldap, &principal, password).await? {
                    return Ok(None);
                }
                self.find_entry(ldap, username).await?
            }
        };

        Ok(Some(DirectoryMatch {
            username: username.to_string(),
            full_name: entry
                .as_ref()
                .and_then(|e| first_attr(e, "displayName").or_else(|| first_attr(e, "cn"))),
            groups: entry
                .and_then(|mut e| e.attrs.remove("memberOf"))
                .unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl IdentityProvider for DirectoryProvider {
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<DirectoryMatch>, ProviderError> {
        // An empty password would be an unauthenticated bind, which most
        // servers accept.
        if username.trim().is_empty() || password.is_empty() {
            return Ok(None);
        }

        let mut ldap = self.connect().await?;
        let outcome = self.authenticate(&mut ldap, username, password).await;
        if let Err(e) = ldap.unbind().await {
            tracing::debug!(error = %e, "LDAP unbind failed");
        }

        let Some(found) = outcome? else {
            tracing::info!(username = %username, "Directory rejected credentials");
            return Ok(None);
        };

        if !in_all_groups(&found.groups, &self.config.required_groups) {
            tracing::warn!(
                username = %username,
                "Directory user authenticated but lacks a required group"
            );
            return Ok(None);
        }

        Ok(Some(found))
    }
}
