//! File-backed provider for deployments without a directory server.
//!
//! The file is a JSON array:
//! `[{"username": "...", "password_hash": "$argon2id$...", "full_name": "...", "groups": ["..."]}]`

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::{DirectoryMatch, IdentityProvider, ProviderError};
use crate::utils::password::{verify_password, PasswordHashString};

#[derive(Debug, Clone, Deserialize)]
pub struct LocalAccount {
    pub username: String,
    pub password_hash: PasswordHashString,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

pub struct LocalProvider {
    accounts: HashMap<String, LocalAccount>,
}

impl LocalProvider {
    pub fn new(accounts: Vec<LocalAccount>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|a| (a.username.to_lowercase(), a))
            .collect();
        Self { accounts }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Misconfigured(format!("cannot read {}: {}", path.display(), e))
        })?;
        let accounts: Vec<LocalAccount> = serde_json::from_str(&raw).map_err(|e| {
            ProviderError::Misconfigured(format!("cannot parse {}: {}", path.display(), e))
        })?;

        tracing::info!(accounts = accounts.len(), "Loaded local identity accounts");
        Ok(Self::new(accounts))
    }
}

#[async_trait]
impl IdentityProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<DirectoryMatch>, ProviderError> {
        let Some(account) = self.accounts.get(&username.to_lowercase()).cloned() else {
            return Ok(None);
        };

        let password = password.to_string();
        let hash = account.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| ProviderError::Unavailable(format!("verification task failed: {}", e)))?;

        if !verified {
            return Ok(None);
        }

        Ok(Some(DirectoryMatch {
            username: account.username,
            full_name: account.full_name,
            groups: account.groups,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::password::hash_password;
    use std::io::Write;

    fn accounts_file() -> tempfile::NamedTempFile {
        let hash = hash_password("hunter22").unwrap();
        let body = serde_json::json!([{
            "username": "Alice@Example.org",
            "password_hash": hash.as_str(),
            "full_name": "Alice Example",
            "groups": ["hpc-admins"]
        }]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.to_string().as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn verifies_accounts_from_file() {
        let file = accounts_file();
        let provider = LocalProvider::from_file(file.path()).unwrap();

        let found = provider
            .verify("alice@example.org", "hunter22")
            .await
            .unwrap()
            .expect("account should match");
        assert_eq!(found.username, "Alice@Example.org");
        assert_eq!(found.full_name.as_deref(), Some("Alice Example"));
        assert_eq!(found.groups, vec!["hpc-admins".to_string()]);

        assert!(provider.verify("alice@example.org", "wrong").await.unwrap().is_none());
        assert!(provider.verify("bob@example.org", "hunter22").await.unwrap().is_none());
    }

    #[test]
    fn rejects_unparseable_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"[{"username": "a", "password_hash": "plain"}]"#)
            .unwrap();
        assert!(matches!(
            LocalProvider::from_file(file.path()),
            Err(ProviderError::Misconfigured(_))
        ));
        assert!(matches!(
            LocalProvider::from_file("/nonexistent/accounts.json"),
            Err(ProviderError::Misconfigured(_))
        ));
    }
}
