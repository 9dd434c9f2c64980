//! HTTP handlers. Each one extracts its inputs, calls the accounting layer
//! and maps the outcome onto a response; authorization lives below.

pub mod accounts;
pub mod admins;
pub mod groups;
pub mod health;
pub mod ids;
pub mod metrics;
pub mod resources;
pub mod services;
pub mod session;
pub mod usage;
pub mod users;
