pub mod auth;
pub mod metrics;

pub use auth::{auth_middleware, bearer_token, AuthPrincipal};
pub use metrics::metrics_middleware;
