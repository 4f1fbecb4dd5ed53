// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository metadata records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::StoreResult;

/// Repository visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// Repository stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Repository {
    pub id: u64,
    pub owner_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub visibility: Visibility,
    /// Location of the bare repository on the server.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repository {
    /// Owners always see their repositories; others only see public ones.
    pub fn is_visible_to(&self, user_id: u64) -> bool {
        self.owner_id == user_id || self.visibility == Visibility::Public
    }
}

#[derive(Debug, Clone)]
pub struct NewRepository {
    pub owner_id: u64,
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub path: String,
}

/// Persistence of repository metadata.
pub trait RepositoryStore: Send + Sync {
    /// # Errors
    /// `StoreError::Duplicate("name")` if the owner already has a repository
    /// with this name.
    fn create_repository(&self, repository: NewRepository) -> StoreResult<Repository>;

    fn find_repository(&self, id: u64) -> StoreResult<Option<Repository>>;

    fn find_repository_by_name(&self, owner_id: u64, name: &str)
        -> StoreResult<Option<Repository>>;

    /// Repositories owned by `owner_id`, ordered by name.
    fn list_repositories(&self, owner_id: u64) -> StoreResult<Vec<Repository>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(owner_id: u64, visibility: Visibility) -> Repository {
        Repository {
            id: 1,
            owner_id,
            name: "demo".to_string(),
            description: String::new(),
            visibility,
            path: "/tmp/demo.git".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn private_repository_visible_only_to_owner() {
        let private = repo(1, Visibility::Private);
        assert!(private.is_visible_to(1));
        assert!(!private.is_visible_to(2));
    }

    #[test]
    fn public_repository_visible_to_everyone() {
        assert!(repo(1, Visibility::Public).is_visible_to(2));
    }

    #[test]
    fn visibility_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Visibility::Public).unwrap(), r#""public""#);
        let parsed: Visibility = serde_json::from_str(r#""private""#).unwrap();
        assert_eq!(parsed, Visibility::Private);
    }
}
