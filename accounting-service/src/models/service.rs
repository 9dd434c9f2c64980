//! Service principals: machine callers that authenticate with an access code
//! and a secret.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Service entity. Only the sha256 digest of the secret is kept.
#[derive(Debug, Clone, FromRow)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub access: String,
    pub secret_digest: String,
    pub created_at: DateTime<Utc>,
}

impl Service {
    pub fn new(name: String, access: String, secret_digest: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            access,
            secret_digest,
            created_at: Utc::now(),
        }
    }
}

/// Listing view: the digest never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceSummary {
    #[schema(example = "batch-scheduler")]
    pub name: String,
    #[schema(example = "Xa81kPq0ZmT4")]
    pub access: String,
}

impl From<Service> for ServiceSummary {
    fn from(service: Service) -> Self {
        Self {
            name: service.name,
            access: service.access,
        }
    }
}

/// Creation response; the only place the plaintext secret ever appears.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedService {
    pub id: Uuid,
    pub name: String,
    pub access: String,
    pub secret: String,
}
