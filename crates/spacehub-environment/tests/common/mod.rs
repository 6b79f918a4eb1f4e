// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for spacehub-environment integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use spacehub_core::memory::{
    MemoryActivityLog, MemoryInstanceStore, MemoryQuotaLedger, MemoryRelatedResources,
    MemoryRepoProvider, MemorySpaceAppStore, MemoryWorkspaceStore, MockComputeManager,
};
use spacehub_core::space::ComputeType;
use spacehub_core::{CreateSpaceRequest, Space};
use spacehub_environment::config::Config;
use spacehub_environment::runtime::{SpaceRuntime, SpaceRuntimeBuilder};

pub const OWNER: &str = "alice";
pub const CPU: &str = "CPU basic 2 vCPU · 16GB";

/// In-memory collaborators kept around for inspection.
pub struct Collaborators {
    pub ledger: Arc<MemoryQuotaLedger>,
    pub repo: Arc<MemoryRepoProvider>,
    pub instances: Arc<MemoryInstanceStore>,
    pub compute: Arc<MockComputeManager>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(MemoryQuotaLedger::new().with_default_total(ComputeType::Npu, 1)),
            repo: Arc::new(MemoryRepoProvider::new()),
            instances: Arc::new(MemoryInstanceStore::new()),
            compute: Arc::new(MockComputeManager::new(Duration::from_secs(3600))),
        }
    }

    /// Builder wired to these collaborators plus fresh stores for the rest.
    pub fn builder(&self, config: Config) -> SpaceRuntimeBuilder {
        SpaceRuntime::builder()
            .config(config)
            .ledger(self.ledger.clone())
            .repo(self.repo.clone())
            .spaces(Arc::new(MemoryWorkspaceStore::new()))
            .apps(Arc::new(MemorySpaceAppStore::new()))
            .instances(self.instances.clone())
            .compute(self.compute.clone())
            .activity(Arc::new(MemoryActivityLog::new()))
            .related(Arc::new(MemoryRelatedResources::new()))
    }

    pub async fn start(&self, config: Config) -> SpaceRuntime {
        self.builder(config).build().unwrap().start().await.unwrap()
    }
}

/// A CPU Space owned by [`OWNER`] with a boot file in its repository.
pub async fn space_with_boot_file(runtime: &SpaceRuntime, repo: &MemoryRepoProvider) -> Space {
    let space = runtime
        .orchestrator()
        .create(CreateSpaceRequest {
            owner: OWNER.to_string(),
            name: "demo".to_string(),
            hardware: CPU.to_string(),
            base_image: "python:3.11".to_string(),
            visibility: None,
            description: None,
        })
        .await
        .unwrap();
    repo.put_file(&space.repo_id, "app.py", b"import gradio")
        .await
        .unwrap();
    space
}

/// Poll `check` until it returns true, failing the test after five seconds.
pub async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
