//! Capability-token authorization

use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use things_core::Capability;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing or invalid bearer token")]
    InvalidToken,

    #[error("Capability not granted: {0}")]
    MissingCapability(Capability),
}

/// Checks whether a caller holds a named capability.
///
/// Capabilities travel inside a signed JWT; there are no user accounts,
/// tokens are minted out-of-band (or logged at startup for development).
pub struct AuthService {
    secret: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    caps: Vec<Capability>,
    exp: i64,
    iat: i64,
}

impl AuthService {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Mints a token granting the given capabilities, valid for a year.
    pub fn issue_token(&self, caps: &[Capability]) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            caps: caps.to_vec(),
            exp: (now + Duration::days(365)).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Verifies the token signature and checks that it grants `cap`.
    pub fn authorize(&self, token: &str, cap: Capability) -> Result<(), AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        if data.claims.caps.contains(&cap) {
            Ok(())
        } else {
            Err(AuthError::MissingCapability(cap))
        }
    }
}
