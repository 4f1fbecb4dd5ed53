// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing with Argon2id.
//!
//! Hashing is CPU bound; the async helpers run it on the blocking pool so the
//! request executor is never stalled.

use std::sync::OnceLock;

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("password hashing failed: {0}")]
    HashingFailed(String),

    #[error("password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Argon2id hasher.
///
/// Defaults to the OWASP 2024 parameters: m=19456 KiB, t=2, p=1.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
    dummy_hash: std::sync::Arc<OnceLock<String>>,
}

impl PasswordHasher {
    /// OWASP-recommended parameters.
    pub fn new() -> Result<Self, PasswordError> {
        Self::with_params(19456, 2, 1)
    }

    /// Custom cost parameters (tests use cheap ones).
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        Ok(Self {
            params,
            dummy_hash: Default::default(),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a PHC string.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a password against a PHC string. Malformed hashes never match.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Hash on the blocking pool.
    pub async fn hash_async(&self, password: String) -> Result<String, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    /// Verify on the blocking pool.
    ///
    /// With no stored hash a dummy hash is verified instead, so unknown
    /// accounts take as long to reject as wrong passwords. Always `false` then.
    pub async fn verify_async(
        &self,
        password: String,
        hash: Option<String>,
    ) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => {
                if let Some(dummy) = hasher.dummy_hash() {
                    hasher.verify(&password, dummy);
                }
                false
            }
        })
        .await
        .map_err(PasswordError::from)
    }

    fn dummy_hash(&self) -> Option<&str> {
        if self.dummy_hash.get().is_none() {
            let hash = self.hash("gitnest-timing-equalizer").ok()?;
            let _ = self.dummy_hash.set(hash);
        }
        self.dummy_hash.get().map(String::as_str)
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::with_params(8, 1, 1).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash));
        assert!(!hasher.verify("wrong horse", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = cheap_hasher();
        assert_ne!(hasher.hash("secret").unwrap(), hasher.hash("secret").unwrap());
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!cheap_hasher().verify("secret", "not-a-phc-string"));
    }

    #[test]
    fn default_params_are_owasp() {
        let hasher = PasswordHasher::new().unwrap();
        assert_eq!(hasher.params.m_cost(), 19456);
        assert_eq!(hasher.params.t_cost(), 2);
        assert_eq!(hasher.params.p_cost(), 1);
    }

    #[test]
    fn invalid_params_are_rejected() {
        assert!(matches!(
            PasswordHasher::with_params(0, 0, 0),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn async_helpers_match_sync_behavior() {
        let hasher = cheap_hasher();
        let hash = hasher.hash_async("secret".to_string()).await.unwrap();
        assert!(hasher
            .verify_async("secret".to_string(), Some(hash))
            .await
            .unwrap());
        assert!(!hasher.verify_async("secret".to_string(), None).await.unwrap());
    }
}
