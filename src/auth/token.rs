use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{AppError, AuthError};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,  // Username
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

impl Claims {
    pub fn expires_at(&self) -> Result<DateTime<Utc>> {
        timestamp_to_datetime(self.exp)
    }
}

fn timestamp_to_datetime(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AppError::AuthError(AuthError::InvalidToken("expiry out of range".into())))
}

/// Signs and verifies HS256 bearer tokens. Pure apart from reading the clock.
///
/// Expiry is checked here against the injected clock rather than by
/// `jsonwebtoken`, with no leeway: a token is dead once `now >= exp`.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(secret: &str, lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
            clock,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, username: &str) -> Result<String> {
        let now = self.clock.now();
        let claims = Claims {
            sub: username.to_string(),
            exp: (now + self.lifetime).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Full check: structure, signature and expiry.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let claims = self.verify_signature(token)?;
        if self.clock.now().timestamp() >= claims.exp {
            return Err(AuthError::InvalidToken("token expired".into()).into());
        }
        Ok(claims)
    }

    /// Checks structure and signature but accepts expired tokens. Used to
    /// resolve who is asking for a logout-all even after their token lapsed.
    pub fn verify_signature(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Username embedded in `token`, read WITHOUT verifying the signature.
    /// Only call this on a token that already passed `validate`.
    pub fn subject_of(&self, token: &str) -> Result<String> {
        Ok(Self::unverified_claims(token)?.sub)
    }

    /// Expiry embedded in `token`, read without verifying the signature.
    pub fn expiry_of(&self, token: &str) -> Result<DateTime<Utc>> {
        Self::unverified_claims(token)?.expires_at()
    }

    fn unverified_claims(token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(data.claims)
    }
}
