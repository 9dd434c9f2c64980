use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Deserializer};

/// Argon2 PHC string for a locally managed account. Validated on load so a
/// malformed entry fails at startup rather than on first login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn parse(hash: impl Into<String>) -> Result<Self, anyhow::Error> {
        let hash = hash.into();
        PasswordHash::new(&hash).map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Self(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PasswordHashString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PasswordHashString::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Hash a password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<PasswordHashString, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString(hash))
}

/// Constant-time verification of `password` against a stored hash.
pub fn verify_password(password: &str, hash: &PasswordHashString) -> bool {
    match PasswordHash::new(hash.as_str()) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
