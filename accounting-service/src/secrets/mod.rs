//! Credential material: service secret digests, TOTP seeds and codes, and
//! logon-name derivation. Everything here is pure and synchronous.

pub mod digest;
pub mod logon_name;
pub mod totp;

use thiserror::Error;

pub use digest::{
    digest_secret, generate_access_code, generate_secret, verify_presented_digest, verify_secret,
};
pub use logon_name::{candidate_logon_name, generate_logon_name, MAX_LOGON_NAME_ATTEMPTS};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("TOTP seed is not valid base32")]
    InvalidSeed,

    #[error("cannot derive a logon name from '{0}'")]
    InvalidDirectoryName(String),

    #[error("no free logon name after {attempts} attempts for '{candidate}'")]
    GenerationExhausted { candidate: String, attempts: usize },
}
