//! Credential hashing.
//!
//! Passwords are stored as Argon2id PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`).
//! The cost parameters used for new digests come from configuration; verification
//! always uses the parameters encoded in the stored digest, so raising the cost
//! later does not invalidate existing passwords.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};
use thiserror::Error;

/// Argon2 work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self { memory_kib: 65536, time_cost: 3, parallelism: 4 }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid argon2 cost parameters: {0}")]
    InvalidCost(String),
    #[error("salt generation failed: {0}")]
    Salt(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password digest is malformed: {0}")]
    MalformedDigest(String),
}

#[derive(Clone)]
pub struct CredentialHasher {
    cost: HashCost,
    params: Params,
    /// Digest of a throwaway secret; verified against when a login names an
    /// unknown account so both paths do the same amount of work.
    dummy: String,
}

impl fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHasher").field("cost", &self.cost).finish_non_exhaustive()
    }
}

impl CredentialHasher {
    pub fn new(cost: HashCost) -> Result<Self, CredentialError> {
        let params = Params::new(cost.memory_kib, cost.time_cost, cost.parallelism, None)
            .map_err(|e| CredentialError::InvalidCost(e.to_string()))?;
        let mut hasher = Self { cost, params, dummy: String::new() };
        hasher.dummy = hasher.hash("timesheet-dummy-credential")?;
        Ok(hasher)
    }

    pub fn cost(&self) -> HashCost { self.cost }

    pub fn dummy_digest(&self) -> &str { &self.dummy }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a secret with a fresh random salt.
    pub fn hash(&self, secret: &str) -> Result<String, CredentialError> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| CredentialError::Salt(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| CredentialError::Salt(e.to_string()))?;
        let phc = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?
            .to_string();
        Ok(phc)
    }

    /// Check a secret against a stored digest.
    ///
    /// `Ok(false)` means the digest is well formed and the secret does not match.
    /// A digest that cannot be parsed, or names parameters argon2 rejects, is
    /// reported as `MalformedDigest` so callers can log it separately.
    pub fn verify(&self, secret: &str, digest: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(digest).map_err(|e| CredentialError::MalformedDigest(e.to_string()))?;
        match self.argon2().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::MalformedDigest(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> CredentialHasher {
        CredentialHasher::new(HashCost { memory_kib: 256, time_cost: 1, parallelism: 1 }).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let h = cheap();
        let digest = h.hash("correct horse").unwrap();
        assert!(digest.starts_with("$argon2id$v=19$m=256,t=1,p=1$"));
        assert!(h.verify("correct horse", &digest).unwrap());
        assert!(!h.verify("correct horse!", &digest).unwrap());
        assert!(!h.verify("", &digest).unwrap());
    }

    #[test]
    fn salts_differ_between_calls() {
        let h = cheap();
        let a = h.hash("same secret").unwrap();
        let b = h.hash("same secret").unwrap();
        assert_ne!(a, b);
        assert!(h.verify("same secret", &a).unwrap());
        assert!(h.verify("same secret", &b).unwrap());
    }

    #[test]
    fn verify_uses_parameters_from_digest() {
        let old = cheap();
        let digest = old.hash("pw").unwrap();
        let newer = CredentialHasher::new(HashCost { memory_kib: 512, time_cost: 2, parallelism: 1 }).unwrap();
        assert!(newer.verify("pw", &digest).unwrap());
    }

    #[test]
    fn malformed_digest_is_distinct_from_mismatch() {
        let h = cheap();
        for bad in ["", "plaintext-password", "$md5$rounds=5000$abcdefgh$abcdefghijklmnopqrstuv"] {
            match h.verify("pw", bad) {
                Err(CredentialError::MalformedDigest(_)) => {}
                other => panic!("expected MalformedDigest for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn invalid_cost_is_rejected() {
        let err = CredentialHasher::new(HashCost { memory_kib: 1, time_cost: 0, parallelism: 1 }).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidCost(_)));
    }

    #[test]
    fn dummy_digest_verifies_nothing_useful() {
        let h = cheap();
        assert!(!h.verify("guess", h.dummy_digest()).unwrap());
    }

    #[test]
    fn debug_does_not_print_dummy() {
        let h = cheap();
        let shown = format!("{:?}", h);
        assert!(shown.contains("memory_kib: 256"));
        assert!(!shown.contains("$argon2id$"));
    }
}
