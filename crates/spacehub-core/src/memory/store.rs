// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory stores for Spaces, SpaceApps and inference instances.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Barrier, Mutex};

use super::FaultSwitch;
use crate::app::{SpaceApp, SpaceAppIndex};
use crate::collaborators::{InstanceStore, SpaceAppStore, WorkspaceStore};
use crate::error::{Error, Result};
use crate::inference::{InferenceDetail, InferenceIndex, InferenceInstance};
use crate::space::{Space, SpaceIndex};

/// Space records keyed by [`SpaceIndex`]. Names are unique per owner.
#[derive(Debug, Default)]
pub struct MemoryWorkspaceStore {
    spaces: Mutex<HashMap<SpaceIndex, Space>>,
    /// Fault switch for `save`.
    pub save_fault: FaultSwitch,
    /// Fault switch for `delete`.
    pub delete_fault: FaultSwitch,
}

impl MemoryWorkspaceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored Spaces.
    pub async fn count(&self) -> usize {
        self.spaces.lock().await.len()
    }
}

#[async_trait]
impl WorkspaceStore for MemoryWorkspaceStore {
    async fn save(&self, space: &Space) -> Result<Space> {
        if self.save_fault.trip() {
            return Err(Error::Store("injected save failure".to_string()));
        }
        let mut spaces = self.spaces.lock().await;
        if spaces
            .values()
            .any(|s| s.owner == space.owner && s.name == space.name)
        {
            return Err(Error::Store(format!(
                "space {}/{} already exists",
                space.owner, space.name
            )));
        }
        let mut stored = space.clone();
        stored.version = 1;
        spaces.insert(stored.index(), stored.clone());
        Ok(stored)
    }

    async fn find(&self, index: &SpaceIndex) -> Result<Option<Space>> {
        Ok(self.spaces.lock().await.get(index).cloned())
    }

    async fn delete(&self, index: &SpaceIndex) -> Result<()> {
        if self.delete_fault.trip() {
            return Err(Error::Store("injected delete failure".to_string()));
        }
        self.spaces
            .lock()
            .await
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| Error::SpaceNotFound(index.to_string()))
    }
}

/// SpaceApp records with version-checked updates.
#[derive(Debug, Default)]
pub struct MemorySpaceAppStore {
    apps: Mutex<HashMap<SpaceAppIndex, SpaceApp>>,
}

impl MemorySpaceAppStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SpaceAppStore for MemorySpaceAppStore {
    async fn find(&self, index: &SpaceAppIndex) -> Result<Option<SpaceApp>> {
        Ok(self.apps.lock().await.get(index).cloned())
    }

    async fn insert(&self, app: &SpaceApp) -> Result<SpaceApp> {
        let mut apps = self.apps.lock().await;
        if let Some(existing) = apps.get(&app.index) {
            return Err(Error::StaleOptimisticVersion {
                entity: "space_app",
                id: app.index.to_string(),
                expected: 0,
                actual: existing.version,
            });
        }
        let mut stored = app.clone();
        stored.version = 1;
        apps.insert(stored.index.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, app: &SpaceApp, expected_version: u64) -> Result<SpaceApp> {
        let mut apps = self.apps.lock().await;
        let current = apps
            .get_mut(&app.index)
            .ok_or_else(|| Error::SpaceAppNotFound(app.index.to_string()))?;
        if current.version != expected_version {
            return Err(Error::StaleOptimisticVersion {
                entity: "space_app",
                id: app.index.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }
        let mut stored = app.clone();
        stored.version = expected_version + 1;
        *current = stored.clone();
        Ok(stored)
    }
}

#[derive(Debug, Default)]
struct InstanceGroup {
    version: u64,
    instances: Vec<InferenceInstance>,
}

type GroupKey = (SpaceIndex, String);

/// Inference instances grouped by `(space, last_commit)`.
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    groups: Mutex<HashMap<GroupKey, InstanceGroup>>,
    find_gate: Mutex<Option<(Arc<Barrier>, usize)>>,
}

impl MemoryInstanceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `callers` calls of `find_instances` wait for each other
    /// after reading, so they all observe the same version.
    pub async fn gate_finds(&self, callers: usize) {
        *self.find_gate.lock().await = Some((Arc::new(Barrier::new(callers)), callers));
    }

    /// Insert an instance unconditionally.
    pub async fn seed(&self, instance: InferenceInstance) {
        let mut groups = self.groups.lock().await;
        let group = groups.entry(group_key(&instance.index)).or_default();
        group.version += 1;
        group.instances.push(instance);
    }

    /// Instances stored for one key.
    pub async fn instances(&self, space: &SpaceIndex, last_commit: &str) -> Vec<InferenceInstance> {
        self.groups
            .lock()
            .await
            .get(&(space.clone(), last_commit.to_string()))
            .map(|g| g.instances.clone())
            .unwrap_or_default()
    }

    /// Look up one instance.
    pub async fn get(&self, index: &InferenceIndex) -> Option<InferenceInstance> {
        self.groups
            .lock()
            .await
            .get(&group_key(index))
            .and_then(|g| g.instances.iter().find(|i| i.index.id == index.id).cloned())
    }
}

fn group_key(index: &InferenceIndex) -> GroupKey {
    (index.space.clone(), index.last_commit.clone())
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn save(&self, instance: &InferenceInstance, expected_version: u64) -> Result<String> {
        let mut groups = self.groups.lock().await;
        let group = groups.entry(group_key(&instance.index)).or_default();
        if group.version != expected_version {
            return Err(Error::DuplicateInstanceCreation {
                space_id: instance.index.space.id.clone(),
                last_commit: instance.index.last_commit.clone(),
            });
        }
        group.version += 1;
        group.instances.push(instance.clone());
        Ok(instance.index.id.clone())
    }

    async fn find_instances(
        &self,
        space: &SpaceIndex,
        last_commit: &str,
    ) -> Result<(Vec<InferenceInstance>, u64)> {
        let gate = {
            let mut gate = self.find_gate.lock().await;
            match gate.as_mut() {
                Some((barrier, remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(barrier.clone())
                }
                _ => None,
            }
        };

        let found = self
            .groups
            .lock()
            .await
            .get(&(space.clone(), last_commit.to_string()))
            .map(|g| (g.instances.clone(), g.version))
            .unwrap_or_default();

        if let Some(barrier) = gate {
            barrier.wait().await;
        }
        Ok(found)
    }

    async fn update_detail(&self, index: &InferenceIndex, detail: &InferenceDetail) -> Result<()> {
        let mut groups = self.groups.lock().await;
        let instance = groups
            .get_mut(&group_key(index))
            .and_then(|g| g.instances.iter_mut().find(|i| i.index.id == index.id))
            .ok_or_else(|| Error::InferenceNotFound(index.to_string()))?;
        instance.apply_detail(detail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_app_update_checks_version() {
        let store = MemorySpaceAppStore::new();
        let app = store
            .insert(&SpaceApp::new(SpaceAppIndex::new("s1", "c1")))
            .await
            .unwrap();
        assert_eq!(app.version, 1);

        let updated = store.update(&app, 1).await.unwrap();
        assert_eq!(updated.version, 2);

        let err = store.update(&app, 1).await.unwrap_err();
        assert!(matches!(
            err,
            Error::StaleOptimisticVersion {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_instance_save_rejects_stale_version() {
        let store = MemoryInstanceStore::new();
        let space = SpaceIndex::new("alice", "s1");
        let first = InferenceInstance::pending(space.clone(), "h1", Utc::now());
        let second = InferenceInstance::pending(space.clone(), "h1", Utc::now());

        store.save(&first, 0).await.unwrap();
        let err = store.save(&second, 0).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateInstanceCreation { .. }));

        let (instances, version) = store.find_instances(&space, "h1").await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_workspace_names_unique_per_owner() {
        let store = MemoryWorkspaceStore::new();
        let space = Space {
            id: "s1".to_string(),
            owner: "alice".to_string(),
            name: "demo".to_string(),
            repo_id: "r1".to_string(),
            hardware: crate::space::Hardware::parse("cpu"),
            base_image: "python:3.11".to_string(),
            visibility: crate::space::Visibility::Public,
            description: None,
            commit_id: None,
            no_application_file: false,
            exception: None,
            comp_power_allocated: false,
            version: 0,
            created_at: Utc::now(),
        };
        store.save(&space).await.unwrap();

        let mut twin = space.clone();
        twin.id = "s2".to_string();
        assert!(store.save(&twin).await.is_err());
        assert_eq!(store.count().await, 1);
    }
}
