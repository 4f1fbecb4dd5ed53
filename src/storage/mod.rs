// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage
//!
//! Relational records (user credentials and repository metadata) are kept in
//! an embedded redb database. Handlers reach them only through the
//! [`CredentialStore`] and [`RepositoryStore`] traits so tests and alternative
//! backends can be swapped in at construction time.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/gitnest.redb
//!   users               id -> Credential (JSON)
//!   users_by_email      normalized email -> id
//!   users_by_username   normalized username -> id
//!   repositories        id -> Repository (JSON)
//!   repos_by_owner      "{owner:020}|{name}" -> id
//!   sequences           table name -> last id
//! ```

pub mod credentials;
pub mod database;
pub mod repositories;

pub use credentials::{Credential, CredentialStore, NewCredential};
pub use database::Database;
pub use repositories::{NewRepository, Repository, RepositoryStore, Visibility};

/// Error type for persistent storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// A unique field (`email`, `username`, repository `name`) is already taken.
    #[error("duplicate {0}")]
    Duplicate(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;
