// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User credential records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::StoreResult;

/// Identity record owned by the credential store.
///
/// The auth core only ever updates `verified` and `password_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub id: u64,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a credential.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Canonical form used for email lookups and uniqueness.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}

/// Canonical form used for username lookups and uniqueness.
///
/// Usernames keep their case; `Alice` and `alice` are different accounts.
pub fn normalize_username(username: &str) -> String {
    username.trim().nfkc().collect()
}

/// Relational persistence of credentials.
pub trait CredentialStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> StoreResult<Option<Credential>>;

    fn find_by_username(&self, username: &str) -> StoreResult<Option<Credential>>;

    fn find_by_id(&self, id: u64) -> StoreResult<Option<Credential>>;

    /// Create a credential with `verified = false`.
    ///
    /// # Errors
    /// `StoreError::Duplicate("email" | "username")` if either is taken.
    fn create(&self, credential: NewCredential) -> StoreResult<Credential>;

    /// # Errors
    /// `StoreError::NotFound` if no credential has this id.
    fn update_verified(&self, id: u64, verified: bool) -> StoreResult<()>;

    /// # Errors
    /// `StoreError::NotFound` if no credential has this id.
    fn update_password_hash(&self, id: u64, password_hash: &str) -> StoreResult<()>;
}
