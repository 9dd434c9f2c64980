//! Business logic: sessions, authorization decisions and the accounting
//! operations built on top of them.

pub mod accounting;
pub mod authz;
pub mod error;
pub mod jwt;
pub mod metrics;
pub mod provisioning;
pub mod session;
pub mod session_store;

pub use accounting::AccountingService;
pub use authz::{Action, AuthorizationEngine, Decision, Scope};
pub use error::ServiceError;
pub use jwt::{JwtService, SessionClaims};
pub use session::{LoginOutcome, LoginSettings, SessionManager};
pub use session_store::{MemorySessionStore, RedisSessionStore, SessionRecord, SessionStore};
