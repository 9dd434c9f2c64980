//! External identity verification. Providers answer "is this password right
//! for this username, and which groups is the user in"; they never decide
//! authorization themselves.

pub mod directory;
pub mod local;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{IdentityBackend, IdentityConfig};

pub use directory::DirectoryProvider;
pub use local::LocalProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMatch {
    pub username: String,
    pub full_name: Option<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider could not be reached or did not answer in time.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("identity provider misconfigured: {0}")]
    Misconfigured(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the credentials were checked and rejected.
    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<DirectoryMatch>, ProviderError>;
}

/// Used when only the sentinel admin and service principals may log in.
pub struct DisabledProvider;

#[async_trait]
impl IdentityProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn verify(&self, _: &str, _: &str) -> Result<Option<DirectoryMatch>, ProviderError> {
        Ok(None)
    }
}

pub fn build_provider(config: &IdentityConfig) -> Result<Arc<dyn IdentityProvider>, ProviderError> {
    match config.backend {
        IdentityBackend::Directory => {
            let directory = config.directory.clone().ok_or_else(|| {
                ProviderError::Misconfigured("directory settings missing".to_string())
            })?;
            Ok(Arc::new(DirectoryProvider::new(directory)))
        }
        IdentityBackend::Local => {
            let path = config.local_credentials_file.as_deref().ok_or_else(|| {
                ProviderError::Misconfigured("LOCAL_CREDENTIALS_FILE missing".to_string())
            })?;
            Ok(Arc::new(LocalProvider::from_file(path)?))
        }
        IdentityBackend::Disabled => Ok(Arc::new(DisabledProvider)),
    }
}

fn common_name(dn: &str) -> &str {
    let first = dn.split(',').next().unwrap_or(dn).trim();
    match first.split_once('=') {
        Some((_, value)) => value.trim(),
        None => first,
    }
}

/// Whether a reported membership (full DN or bare name) names the
/// configured group (full DN or bare name). Case-insensitive.
pub fn group_matches(membership: &str, configured: &str) -> bool {
    let configured = configured.trim();
    membership.trim().eq_ignore_ascii_case(configured)
        || common_name(membership).eq_ignore_ascii_case(common_name(configured))
}

pub fn in_any_group(memberships: &[String], configured: &[String]) -> bool {
    configured
        .iter()
        .any(|c| memberships.iter().any(|m| group_matches(m, c)))
}

pub fn in_all_groups(memberships: &[String], configured: &[String]) -> bool {
    configured
        .iter()
        .all(|c| memberships.iter().any(|m| group_matches(m, c)))
}
