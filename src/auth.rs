use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
    pub iss: String, // Issuer
}

/// Issues and verifies the bearer tokens handed out at registration/login.
///
/// Tokens are HS256 JWTs with a long TTL (the API has no refresh flow; a
/// token simply expires and the user logs in again).
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_days: i64,
    issuer: String,
}

impl AuthManager {
    pub fn new(config: &Config) -> Result<Self> {
        if config.jwt_secret.is_empty() {
            anyhow::bail!("JWT_SECRET is required to issue tokens");
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl_days: config.token_ttl_days,
            issuer: config.jwt_issuer.clone(),
        })
    }

    /// Create a bearer token for a user.
    /// Returns the encoded token and its expiry as a unix timestamp.
    pub fn create_token(&self, user_id: &Uuid) -> Result<(String, i64)> {
        let now = Utc::now();
        let exp = now + Duration::days(self.token_ttl_days);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to encode JWT token")?;

        Ok((token, exp.timestamp()))
    }

    /// Verify a bearer token's signature, expiry and issuer.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.clone()]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Token verification failed")?;

        Ok(token_data.claims)
    }
}
