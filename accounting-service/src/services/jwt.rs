use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::config::TokenConfig;

/// Signs and checks bearer tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    lifetime_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    /// Session key of the principal (`admin`, `user:<dom_name>`, `service:<name>`).
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    /// `super_admin`, `user` or `service`.
    pub kind: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signature and issuer are fine but the lifetime has passed. The claims
    /// are returned so the caller can purge the session they name.
    #[error("token expired")]
    Expired(Box<SessionClaims>),

    #[error("invalid token")]
    Invalid,
}

impl JwtService {
    pub fn new(config: &TokenConfig) -> Result<Self, anyhow::Error> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|e| anyhow::anyhow!("Unknown token algorithm {}: {}", config.algorithm, e))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(anyhow::anyhow!(
                "Token algorithm {} is not an HMAC algorithm",
                config.algorithm
            ));
        }

        tracing::info!(algorithm = ?algorithm, "JWT service initialized");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            algorithm,
            issuer: config.issuer.clone(),
            lifetime_seconds: config.lifetime_seconds,
        })
    }

    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime_seconds
    }

    pub fn issue(&self, subject: &str, kind: &str) -> Result<(String, SessionClaims), anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_seconds);

        let claims = SessionClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))?;

        Ok((token, claims))
    }

    /// Checks signature and issuer, then the expiry with no leeway.
    pub fn decode(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked below without the library's default leeway.
        validation.validate_exp = false;
        validation.required_spec_claims = ["exp", "iss", "sub"].iter().map(|c| c.to_string()).collect();
        validation.set_issuer(&[self.issuer.as_str()]);

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if Utc::now().timestamp() >= claims.exp {
            return Err(TokenError::Expired(Box::new(claims)));
        }

        Ok(claims)
    }
}
