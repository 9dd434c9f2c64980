use super::error::ServiceError;
use crate::models::{normalize_dom_name, User, SUPER_ADMIN_NAME};
use crate::secrets::{candidate_logon_name, generate_logon_name, totp};
use crate::store::{StoreError, StoreHandle};

/// Concurrent provisioning can race for the same derived logon name; the
/// unique constraint rejects the loser, which re-derives and retries.
const PROVISION_RETRIES: usize = 3;

/// Creates a user with a fresh TOTP seed and a derived logon name. The
/// `dom_name` is stored lower-cased; a clash on it is a
/// [`ServiceError::Conflict`].
pub async fn provision_user(
    store: &StoreHandle,
    dom_name: &str,
    full_name: &str,
) -> Result<User, ServiceError> {
    let dom_name = normalize_dom_name(dom_name);
    let dom_name = dom_name.as_str();
    if dom_name.eq_ignore_ascii_case(SUPER_ADMIN_NAME) {
        return Err(ServiceError::Validation(format!(
            "'{}' is reserved",
            SUPER_ADMIN_NAME
        )));
    }

    let candidate = candidate_logon_name(dom_name)?;

    for attempt in 1..=PROVISION_RETRIES {
        let taken = store.run(|s| s.logon_names_like(&candidate)).await?;
        let logon_name = generate_logon_name(dom_name, &taken)?;
        let user = User::new(
            dom_name.to_string(),
            full_name.to_string(),
            logon_name,
            totp::generate_seed(),
        );

        match store.run(|s| s.insert_user(user)).await {
            Ok(user) => {
                tracing::info!(
                    dom_name = %user.dom_name,
                    logon_name = %user.logon_name,
                    "User provisioned"
                );
                return Ok(user);
            }
            Err(StoreError::Conflict(what)) => {
                if store.run(|s| s.find_user_by_dom_name(dom_name)).await?.is_some() {
                    return Err(ServiceError::Conflict(format!("user '{}' already exists", dom_name)));
                }
                tracing::debug!(attempt, conflict = %what, "Logon name taken concurrently, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ServiceError::Conflict(format!(
        "could not allocate a logon name for '{}'",
        dom_name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn store() -> StoreHandle {
        StoreHandle::new(Arc::new(MemoryCredentialStore::new()), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn derives_distinct_logon_names() {
        let store = store();
        let first = provision_user(&store, "jane.doe@example.org", "Jane Doe").await.unwrap();
        let second = provision_user(&store, "jack.doe@example.org", "Jack Doe").await.unwrap();

        assert_eq!(first.logon_name, "jadoe.example");
        assert_eq!(second.logon_name, "jadoe.example.0");
        assert_eq!(first.seed.len(), 32);
    }

    #[tokio::test]
    async fn duplicate_dom_names_conflict() {
        let store = store();
        provision_user(&store, "jane.doe@example.org", "Jane").await.unwrap();
        let err = provision_user(&store, "jane.doe@example.org", "Jane").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let err = provision_user(&store, " Jane.Doe@Example.org", "Jane").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn admin_is_reserved() {
        let err = provision_user(&store(), "admin", "Root").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
