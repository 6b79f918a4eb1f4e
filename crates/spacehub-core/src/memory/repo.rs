// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory repository provider.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::FaultSwitch;
use crate::collaborators::RepoProvider;
use crate::error::{Error, Result};
use crate::space::Visibility;

#[derive(Debug)]
struct MemoryRepo {
    owner: String,
    name: String,
    visibility: Visibility,
    files: HashMap<String, Vec<u8>>,
}

/// Repository provider holding repositories and their files in memory.
///
/// File content hashes are hex-encoded SHA-256 digests.
#[derive(Debug, Default)]
pub struct MemoryRepoProvider {
    repos: Mutex<HashMap<String, MemoryRepo>>,
    /// Fault switch for `create`.
    pub create_fault: FaultSwitch,
    /// Fault switch for `delete`.
    pub delete_fault: FaultSwitch,
}

impl MemoryRepoProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a file into a repository.
    pub async fn put_file(&self, repo_id: &str, path: &str, content: &[u8]) -> Result<()> {
        let mut repos = self.repos.lock().await;
        let repo = repos
            .get_mut(repo_id)
            .ok_or_else(|| Error::Repo(format!("repository {repo_id} not found")))?;
        repo.files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    /// Visibility a repository was created with.
    pub async fn visibility(&self, repo_id: &str) -> Option<Visibility> {
        self.repos.lock().await.get(repo_id).map(|r| r.visibility)
    }

    /// Whether a repository exists.
    pub async fn exists(&self, repo_id: &str) -> bool {
        self.repos.lock().await.contains_key(repo_id)
    }

    /// Number of repositories.
    pub async fn count(&self) -> usize {
        self.repos.lock().await.len()
    }
}

fn file_path(dir: &str, file: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

#[async_trait]
impl RepoProvider for MemoryRepoProvider {
    async fn create(&self, owner: &str, name: &str, visibility: Visibility) -> Result<String> {
        if self.create_fault.trip() {
            return Err(Error::Repo("injected create failure".to_string()));
        }
        let mut repos = self.repos.lock().await;
        if repos.values().any(|r| r.owner == owner && r.name == name) {
            return Err(Error::Repo(format!("repository {owner}/{name} already exists")));
        }
        let id = uuid::Uuid::new_v4().to_string();
        repos.insert(
            id.clone(),
            MemoryRepo {
                owner: owner.to_string(),
                name: name.to_string(),
                visibility,
                files: HashMap::new(),
            },
        );
        Ok(id)
    }

    async fn delete(&self, _owner: &str, repo_id: &str) -> Result<()> {
        if self.delete_fault.trip() {
            return Err(Error::Repo("injected delete failure".to_string()));
        }
        self.repos
            .lock()
            .await
            .remove(repo_id)
            .map(|_| ())
            .ok_or_else(|| Error::Repo(format!("repository {repo_id} not found")))
    }

    async fn get_dir_file_info(
        &self,
        _owner: &str,
        repo_id: &str,
        dir: &str,
        file: &str,
    ) -> Result<Option<String>> {
        let repos = self.repos.lock().await;
        let repo = repos
            .get(repo_id)
            .ok_or_else(|| Error::Repo(format!("repository {repo_id} not found")))?;
        Ok(repo.files.get(&file_path(dir, file)).map(|content| {
            let mut hasher = Sha256::new();
            hasher.update(content);
            format!("{:x}", hasher.finalize())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_hash_follows_content() {
        let provider = MemoryRepoProvider::new();
        let id = provider
            .create("alice", "demo", Visibility::Public)
            .await
            .unwrap();

        assert_eq!(
            provider
                .get_dir_file_info("alice", &id, "", "app.py")
                .await
                .unwrap(),
            None
        );

        provider.put_file(&id, "app.py", b"print(1)").await.unwrap();
        let first = provider
            .get_dir_file_info("alice", &id, "", "app.py")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.len(), 64);

        provider.put_file(&id, "app.py", b"print(2)").await.unwrap();
        let second = provider
            .get_dir_file_info("alice", &id, "/", "app.py")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let provider = MemoryRepoProvider::new();
        provider
            .create("alice", "demo", Visibility::Public)
            .await
            .unwrap();
        assert!(
            provider
                .create("alice", "demo", Visibility::Private)
                .await
                .is_err()
        );
    }

    #[test]
    fn test_file_path() {
        assert_eq!(file_path("", "app.py"), "app.py");
        assert_eq!(file_path("src/", "app.py"), "src/app.py");
    }
}
