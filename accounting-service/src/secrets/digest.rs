use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const SERVICE_SECRET_LENGTH: usize = 24;
pub const ACCESS_CODE_LENGTH: usize = 12;

/// Lowercase hex sha256 of a secret, as stored for services and the
/// sentinel administrator.
pub fn digest_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Compares the digest of `supplied` against `stored_digest` in constant time.
pub fn verify_secret(supplied: &str, stored_digest: &str) -> bool {
    let computed = digest_secret(supplied);
    computed
        .as_bytes()
        .ct_eq(stored_digest.to_ascii_lowercase().as_bytes())
        .into()
}

/// The sentinel administrator presents the digest itself rather than the
/// secret; compares that presented digest against `digest_secret(secret)`.
pub fn verify_presented_digest(presented: &str, secret: &str) -> bool {
    digest_secret(secret)
        .as_bytes()
        .ct_eq(presented.to_ascii_lowercase().as_bytes())
        .into()
}

fn alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_secret() -> String {
    alphanumeric(SERVICE_SECRET_LENGTH)
}

pub fn generate_access_code() -> String {
    alphanumeric(ACCESS_CODE_LENGTH)
}
