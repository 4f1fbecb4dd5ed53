// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token randomness and storage digests.
//!
//! Raw refresh and one-time tokens are handed to the client only. The KV store
//! keys them by a keyed HMAC-SHA256 digest, so a dump of the store does not
//! yield usable tokens.

use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// `len` bytes from the OS CSPRNG, hex encoded (`2 * len` characters).
pub fn random_hex(len: usize) -> Result<String, AuthError> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AuthError::Internal("random generation failed".to_string()))?;
    Ok(hex::encode(bytes))
}

/// Keyed digest of opaque tokens.
#[derive(Clone)]
pub struct TokenDigester {
    mac: HmacSha256,
}

impl TokenDigester {
    /// # Errors
    /// `AuthError::Internal` if the key is rejected by the HMAC implementation.
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, AuthError> {
        let mac = HmacSha256::new_from_slice(key.as_ref())
            .map_err(|e| AuthError::Internal(format!("invalid digest key: {e}")))?;
        Ok(Self { mac })
    }

    /// Hex HMAC-SHA256 of `token`.
    pub fn digest(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for TokenDigester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDigester").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_hex_has_expected_length() {
        assert_eq!(random_hex(16).unwrap().len(), 32);
        assert_eq!(random_hex(64).unwrap().len(), 128);
    }

    #[test]
    fn random_hex_does_not_repeat() {
        let a = random_hex(32).unwrap();
        let b = random_hex(32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_is_stable_and_keyed() {
        let one = TokenDigester::new("secret-one").unwrap();
        let two = TokenDigester::new("secret-two").unwrap();
        assert_eq!(one.digest("token"), one.digest("token"));
        assert_ne!(one.digest("token"), two.digest("token"));
        assert_ne!(one.digest("token"), one.digest("other"));
        assert_eq!(one.digest("token").len(), 64);
    }
}
