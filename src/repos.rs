// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Repository Provisioning
//!
//! Each repository is one bare git repository on disk:
//!
//! ```text
//! {REPOS_ROOT}/{owner_id}/{name}.git
//! ```
//!
//! The directory is created with `git init --bare`; metadata lives in the
//! [`RepositoryStore`](crate::storage::RepositoryStore).

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

/// Longest accepted repository name.
pub const MAX_REPO_NAME_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("repository already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git init failed: {0}")]
    Git(String),
}

/// Validate a repository name: `[A-Za-z0-9._-]`, 1 to 100 characters, no
/// leading dot, not ending in `.git`.
pub fn validate_repo_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("repository name is required");
    }
    if name.len() > MAX_REPO_NAME_LEN {
        return Err("repository name is too long");
    }
    if name.starts_with('.') {
        return Err("repository name must not start with a dot");
    }
    if name.ends_with(".git") {
        return Err("repository name must not end with .git");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err("repository name may only contain letters, digits, '.', '_' and '-'");
    }
    Ok(())
}

/// Creates repository storage for an owner.
#[async_trait]
pub trait RepoProvisioner: Send + Sync {
    /// Where `name` of `owner_id` lives (or would live).
    fn repo_path(&self, owner_id: u64, name: &str) -> PathBuf;

    /// Create an empty repository and return its path.
    async fn provision(&self, owner_id: u64, name: &str) -> Result<PathBuf, ProvisionError>;
}

/// Provisioner backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitProvisioner {
    root: PathBuf,
}

impl GitProvisioner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RepoProvisioner for GitProvisioner {
    fn repo_path(&self, owner_id: u64, name: &str) -> PathBuf {
        self.root.join(owner_id.to_string()).join(format!("{name}.git"))
    }

    async fn provision(&self, owner_id: u64, name: &str) -> Result<PathBuf, ProvisionError> {
        let path = self.repo_path(owner_id, name);
        if tokio::fs::try_exists(&path).await? {
            return Err(ProvisionError::AlreadyExists(path));
        }
        tokio::fs::create_dir_all(&path).await?;

        let output = Command::new("git")
            .arg("init")
            .arg("--bare")
            .arg("--quiet")
            .current_dir(&path)
            .output()
            .await?;

        if !output.status.success() {
            // Leave no half-initialized directory behind
            let _ = tokio::fs::remove_dir_all(&path).await;
            return Err(ProvisionError::Git(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        info!(owner_id, name, path = %path.display(), "bare repository created");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_pass() {
        let longest = "x".repeat(MAX_REPO_NAME_LEN);
        for name in ["demo", "my-repo", "my_repo.v2", "A1", longest.as_str()] {
            assert!(validate_repo_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn invalid_names_fail() {
        let too_long = "x".repeat(MAX_REPO_NAME_LEN + 1);
        for name in [
            "",
            ".hidden",
            "has space",
            "slash/name",
            "..",
            "dots/../up",
            "demo.git",
            "émoji",
            too_long.as_str(),
        ] {
            assert!(validate_repo_name(name).is_err(), "{name:?} should be invalid");
        }
    }

    #[test]
    fn repo_path_layout() {
        let provisioner = GitProvisioner::new("/srv/repos");
        assert_eq!(
            provisioner.repo_path(7, "demo"),
            PathBuf::from("/srv/repos/7/demo.git")
        );
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    #[tokio::test]
    async fn provision_creates_bare_repository() {
        if !git_available() {
            eprintln!("git not installed; skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let provisioner = GitProvisioner::new(dir.path());

        let path = provisioner.provision(3, "demo").await.unwrap();
        assert_eq!(path, dir.path().join("3").join("demo.git"));
        assert!(path.join("HEAD").is_file());
        assert!(path.join("objects").is_dir());
        assert!(!path.join(".git").exists());

        let err = provisioner.provision(3, "demo").await.unwrap_err();
        assert!(matches!(err, ProvisionError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn provision_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = GitProvisioner::new(dir.path());
        std::fs::create_dir_all(provisioner.repo_path(1, "demo")).unwrap();

        let err = provisioner.provision(1, "demo").await.unwrap_err();
        assert!(matches!(err, ProvisionError::AlreadyExists(_)));
    }
}
