// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded credential and repository database backed by redb.
//!
//! Uniqueness checks and inserts share one write transaction. redb serializes
//! writers, so two concurrent registrations for the same email cannot both
//! succeed.

use std::path::Path;

use chrono::Utc;
use redb::{ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;

use super::credentials::{normalize_email, normalize_username};
use super::{
    Credential, CredentialStore, NewCredential, NewRepository, Repository, RepositoryStore,
    StoreError, StoreResult,
};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user id -> serialized Credential (JSON bytes).
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Index: normalized email -> user id.
const USERS_BY_EMAIL: TableDefinition<&str, u64> = TableDefinition::new("users_by_email");

/// Index: normalized username -> user id.
const USERS_BY_USERNAME: TableDefinition<&str, u64> = TableDefinition::new("users_by_username");

/// Primary table: repository id -> serialized Repository (JSON bytes).
const REPOSITORIES: TableDefinition<u64, &[u8]> = TableDefinition::new("repositories");

/// Index: `{owner_id:020}|{name}` -> repository id.
/// Zero padding keeps one owner's entries contiguous and sorted by name.
const REPOS_BY_OWNER: TableDefinition<&str, u64> = TableDefinition::new("repos_by_owner");

/// Monotonic id counters, keyed by primary table name.
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

fn owner_key(owner_id: u64, name: &str) -> String {
    format!("{owner_id:020}|{name}")
}

/// `[start, end)` bounds covering every index key of one owner.
fn owner_range(owner_id: u64) -> (String, String) {
    // '}' sorts immediately after '|'
    (format!("{owner_id:020}|"), format!("{owner_id:020}}}"))
}

/// Allocate the next id for `sequence` inside an open write transaction.
fn next_id(write_txn: &WriteTransaction, sequence: &str) -> StoreResult<u64> {
    let mut table = write_txn.open_table(SEQUENCES)?;
    let current = table.get(sequence)?.map(|v| v.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// =============================================================================
// Database
// =============================================================================

/// Embedded ACID store for credentials and repository metadata.
pub struct Database {
    db: redb::Database,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = redb::Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_EMAIL)?;
            let _ = write_txn.open_table(USERS_BY_USERNAME)?;
            let _ = write_txn.open_table(REPOSITORIES)?;
            let _ = write_txn.open_table(REPOS_BY_OWNER)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn user_by_index(
        &self,
        index: TableDefinition<&str, u64>,
        key: &str,
    ) -> StoreResult<Option<Credential>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(index)?;
        let Some(id) = index.get(key)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Read, modify and rewrite one credential in a single write transaction.
    fn update_user(&self, id: u64, apply: impl FnOnce(&mut Credential)) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let existing_bytes = {
                let existing = users
                    .get(id)?
                    .ok_or_else(|| StoreError::NotFound(format!("User {id}")))?;
                existing.value().to_vec()
            };

            let mut credential: Credential = decode(&existing_bytes)?;
            apply(&mut credential);
            credential.updated_at = Utc::now();

            let json = serde_json::to_vec(&credential)?;
            users.insert(id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// Credentials
// =============================================================================

impl CredentialStore for Database {
    fn find_by_email(&self, email: &str) -> StoreResult<Option<Credential>> {
        self.user_by_index(USERS_BY_EMAIL, &normalize_email(email))
    }

    fn find_by_username(&self, username: &str) -> StoreResult<Option<Credential>> {
        self.user_by_index(USERS_BY_USERNAME, &normalize_username(username))
    }

    fn find_by_id(&self, id: u64) -> StoreResult<Option<Credential>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn create(&self, new: NewCredential) -> StoreResult<Credential> {
        let email = normalize_email(&new.email);
        let username = normalize_username(&new.username);

        let write_txn = self.db.begin_write()?;
        let credential = {
            let mut by_email = write_txn.open_table(USERS_BY_EMAIL)?;
            if by_email.get(email.as_str())?.is_some() {
                return Err(StoreError::Duplicate("email"));
            }
            let mut by_username = write_txn.open_table(USERS_BY_USERNAME)?;
            if by_username.get(username.as_str())?.is_some() {
                return Err(StoreError::Duplicate("username"));
            }

            let id = next_id(&write_txn, "users")?;
            let now = Utc::now();
            let credential = Credential {
                id,
                username,
                email,
                password_hash: new.password_hash,
                verified: false,
                created_at: now,
                updated_at: now,
            };

            let json = serde_json::to_vec(&credential)?;
            write_txn.open_table(USERS)?.insert(id, json.as_slice())?;
            by_email.insert(credential.email.as_str(), id)?;
            by_username.insert(credential.username.as_str(), id)?;
            credential
        };
        write_txn.commit()?;
        Ok(credential)
    }

    fn update_verified(&self, id: u64, verified: bool) -> StoreResult<()> {
        self.update_user(id, |c| c.verified = verified)
    }

    fn update_password_hash(&self, id: u64, password_hash: &str) -> StoreResult<()> {
        self.update_user(id, |c| c.password_hash = password_hash.to_string())
    }
}

// =============================================================================
// Repositories
// =============================================================================

impl RepositoryStore for Database {
    fn create_repository(&self, new: NewRepository) -> StoreResult<Repository> {
        let key = owner_key(new.owner_id, &new.name);

        let write_txn = self.db.begin_write()?;
        let repository = {
            let mut by_owner = write_txn.open_table(REPOS_BY_OWNER)?;
            if by_owner.get(key.as_str())?.is_some() {
                return Err(StoreError::Duplicate("name"));
            }

            let id = next_id(&write_txn, "repositories")?;
            let now = Utc::now();
            let repository = Repository {
                id,
                owner_id: new.owner_id,
                name: new.name,
                description: new.description,
                visibility: new.visibility,
                path: new.path,
                created_at: now,
                updated_at: now,
            };

            let json = serde_json::to_vec(&repository)?;
            write_txn.open_table(REPOSITORIES)?.insert(id, json.as_slice())?;
            by_owner.insert(key.as_str(), id)?;
            repository
        };
        write_txn.commit()?;
        Ok(repository)
    }

    fn find_repository(&self, id: u64) -> StoreResult<Option<Repository>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REPOSITORIES)?;
        match table.get(id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn find_repository_by_name(
        &self,
        owner_id: u64,
        name: &str,
    ) -> StoreResult<Option<Repository>> {
        let key = owner_key(owner_id, name);
        let read_txn = self.db.begin_read()?;
        let by_owner = read_txn.open_table(REPOS_BY_OWNER)?;
        let Some(id) = by_owner.get(key.as_str())?.map(|v| v.value()) else {
            return Ok(None);
        };
        let table = read_txn.open_table(REPOSITORIES)?;
        match table.get(id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn list_repositories(&self, owner_id: u64) -> StoreResult<Vec<Repository>> {
        let (start, end) = owner_range(owner_id);
        let read_txn = self.db.begin_read()?;
        let by_owner = read_txn.open_table(REPOS_BY_OWNER)?;
        let table = read_txn.open_table(REPOSITORIES)?;

        let mut results = Vec::new();
        for entry in by_owner.range(start.as_str()..end.as_str())? {
            let (_, id) = entry?;
            if let Some(value) = table.get(id.value())? {
                results.push(decode(value.value())?);
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Visibility;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.redb")).unwrap();
        (dir, db)
    }

    fn alice() -> NewCredential {
        NewCredential {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        }
    }

    fn new_repo(owner_id: u64, name: &str) -> NewRepository {
        NewRepository {
            owner_id,
            name: name.to_string(),
            description: String::new(),
            visibility: Visibility::Private,
            path: format!("/srv/{owner_id}/{name}.git"),
        }
    }

    #[test]
    fn create_and_find_credential() {
        let (_dir, db) = open_temp();
        let created = db.create(alice()).unwrap();
        assert_eq!(created.id, 1);
        assert!(!created.verified);

        assert_eq!(db.find_by_id(1).unwrap().unwrap(), created);
        assert_eq!(db.find_by_email("ALICE@example.com").unwrap().unwrap().id, 1);
        assert_eq!(db.find_by_username("alice").unwrap().unwrap().id, 1);
        assert!(db.find_by_email("bob@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_rejected_before_username() {
        let (_dir, db) = open_temp();
        db.create(alice()).unwrap();

        let err = db.create(alice()).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));

        let mut same_name = alice();
        same_name.email = "other@example.com".to_string();
        let err = db.create(same_name).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("username")));
    }

    #[test]
    fn ids_are_sequential() {
        let (_dir, db) = open_temp();
        db.create(alice()).unwrap();
        let bob = db
            .create(NewCredential {
                username: "bob".to_string(),
                email: "bob@example.com".to_string(),
                password_hash: "x".to_string(),
            })
            .unwrap();
        assert_eq!(bob.id, 2);
    }

    #[test]
    fn update_verified_and_password() {
        let (_dir, db) = open_temp();
        let created = db.create(alice()).unwrap();

        db.update_verified(created.id, true).unwrap();
        db.update_password_hash(created.id, "$argon2id$new").unwrap();

        let stored = db.find_by_id(created.id).unwrap().unwrap();
        assert!(stored.verified);
        assert_eq!(stored.password_hash, "$argon2id$new");
        assert!(stored.updated_at >= created.updated_at);
    }

    #[test]
    fn update_missing_user_is_not_found() {
        let (_dir, db) = open_temp();
        assert!(matches!(db.update_verified(42, true), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let db = Database::open(&path).unwrap();
            db.create(alice()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.find_by_email("alice@example.com").unwrap().is_some());
    }

    #[test]
    fn repositories_listed_per_owner_by_name() {
        let (_dir, db) = open_temp();
        db.create_repository(new_repo(1, "zeta")).unwrap();
        db.create_repository(new_repo(1, "alpha")).unwrap();
        db.create_repository(new_repo(2, "other")).unwrap();
        // Owner 10 shares a textual prefix with owner 1 without padding
        db.create_repository(new_repo(10, "ten")).unwrap();

        let names: Vec<_> = db
            .list_repositories(1)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(db.list_repositories(3).unwrap().is_empty());
    }

    #[test]
    fn duplicate_repository_name_per_owner() {
        let (_dir, db) = open_temp();
        db.create_repository(new_repo(1, "demo")).unwrap();
        let err = db.create_repository(new_repo(1, "demo")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("name")));
        // Another owner may reuse the name
        db.create_repository(new_repo(2, "demo")).unwrap();
    }

    #[test]
    fn find_repository_by_id_and_name() {
        let (_dir, db) = open_temp();
        let created = db.create_repository(new_repo(1, "demo")).unwrap();
        assert_eq!(db.find_repository(created.id).unwrap().unwrap(), created);
        assert_eq!(
            db.find_repository_by_name(1, "demo").unwrap().unwrap().id,
            created.id
        );
        assert!(db.find_repository_by_name(2, "demo").unwrap().is_none());
        assert!(db.find_repository(99).unwrap().is_none());
    }
}
