use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::debug;

use super::principal::{Claims, Role};

pub type SessionToken = String;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("session ttl must be positive, got {0}s")]
    InvalidTtl(i64),
    #[error("token could not be signed: {0}")]
    Sign(String),
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token signature does not match")]
    BadSignature,
    #[error("token expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },
    #[error("expiry overflows at now={now} with ttl {ttl_secs}s")]
    ExpiryOutOfRange { now: i64, ttl_secs: i64 },
}

impl TokenError {
    /// Short label for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::InvalidTtl(_) => "invalid_ttl",
            TokenError::Sign(_) => "sign_failed",
            TokenError::Malformed(_) => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired { .. } => "expired",
            TokenError::ExpiryOutOfRange { .. } => "expiry_out_of_range",
        }
    }
}

/// Issues and validates HS256 bearer tokens.
///
/// Holds only the key material and the ttl, both fixed at construction, so one
/// instance is shared by every request handler.
#[derive(Clone)]
pub struct SessionManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("key", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl SessionManager {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Result<Self, TokenError> {
        if ttl_secs <= 0 {
            return Err(TokenError::InvalidTtl(ttl_secs));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the caller's clock in `validate`.
        validation.validate_exp = false;
        validation.leeway = 0;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
        })
    }

    pub fn ttl_secs(&self) -> i64 { self.ttl_secs }

    /// Sign a claim for `subject` expiring `ttl` seconds after `now`.
    pub fn issue(&self, subject: &str, role: Role, company: Option<&str>, now: i64) -> Result<SessionToken, TokenError> {
        let exp = now
            .checked_add(self.ttl_secs)
            .ok_or(TokenError::ExpiryOutOfRange { now, ttl_secs: self.ttl_secs })?;
        let claims = Claims { sub: subject.to_string(), role, company: company.map(str::to_string), exp };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Sign(e.to_string()))?;
        debug!(target: "timesheet::auth", sub = %claims.sub, role = %claims.role, exp = claims.exp, "session.issue");
        Ok(token)
    }

    /// Validate a presented token at time `now`.
    ///
    /// The signature is checked before the body is parsed; a token whose body
    /// does not have the exact claim shape is `Malformed` even when signed.
    /// Expiry is exclusive: a token is dead at `now == exp`.
    pub fn validate(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;
        let claims = data.claims;
        if claims.exp <= now {
            return Err(TokenError::Expired { exp: claims.exp, now });
        }
        Ok(claims)
    }
}
