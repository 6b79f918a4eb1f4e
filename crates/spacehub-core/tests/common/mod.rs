// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for spacehub-core integration tests.
//!
//! Provides TestContext wiring every service to in-memory collaborators.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use spacehub_core::config::{LeaseConfig, SpaceConfig};
use spacehub_core::memory::{
    MemoryActivityLog, MemoryInstanceStore, MemoryQuotaLedger, MemoryRelatedResources,
    MemoryRepoProvider, MemorySpaceAppStore, MemoryWorkspaceStore, MockComputeManager,
    RecordingPublisher,
};
use spacehub_core::space::ComputeType;
use spacehub_core::{
    CreateSpaceRequest, InferenceService, OrchestratorDeps, SpaceAppService, SpaceOrchestrator,
};

pub const OWNER: &str = "alice";
pub const NPU: &str = "NPU basic 8 vCPU · 32GB · 1 Ascend";
pub const CPU: &str = "CPU basic 2 vCPU · 16GB";

/// Test context holding the services and their collaborators.
pub struct TestContext {
    pub ledger: Arc<MemoryQuotaLedger>,
    pub repo: Arc<MemoryRepoProvider>,
    pub spaces: Arc<MemoryWorkspaceStore>,
    pub apps: Arc<MemorySpaceAppStore>,
    pub instances: Arc<MemoryInstanceStore>,
    pub compute: Arc<MockComputeManager>,
    pub publisher: Arc<RecordingPublisher>,
    pub activity: Arc<MemoryActivityLog>,
    pub related: Arc<MemoryRelatedResources>,
    pub orchestrator: SpaceOrchestrator,
    pub app_service: SpaceAppService,
    pub inference: InferenceService,
}

impl TestContext {
    /// Context with one NPU slot for [`OWNER`] and default lease settings.
    pub async fn new() -> Self {
        Self::with_lease(LeaseConfig::default()).await
    }

    /// Context with custom lease settings.
    pub async fn with_lease(lease: LeaseConfig) -> Self {
        let ledger = Arc::new(MemoryQuotaLedger::new());
        ledger.set_quota(OWNER, ComputeType::Npu, 1).await;

        let repo = Arc::new(MemoryRepoProvider::new());
        let spaces = Arc::new(MemoryWorkspaceStore::new());
        let apps = Arc::new(MemorySpaceAppStore::new());
        let instances = Arc::new(MemoryInstanceStore::new());
        let compute = Arc::new(MockComputeManager::new(Duration::from_secs(3600)));
        let publisher = Arc::new(RecordingPublisher::new());
        let activity = Arc::new(MemoryActivityLog::new());
        let related = Arc::new(MemoryRelatedResources::new());

        let orchestrator = SpaceOrchestrator::new(
            OrchestratorDeps {
                ledger: ledger.clone(),
                repo: repo.clone(),
                store: spaces.clone(),
                publisher: publisher.clone(),
                activity: activity.clone(),
                related: related.clone(),
            },
            SpaceConfig::default(),
        );
        let app_service = SpaceAppService::new(apps.clone());
        let inference = InferenceService::new(
            repo.clone(),
            instances.clone(),
            compute.clone(),
            publisher.clone(),
            lease,
        );

        Self {
            ledger,
            repo,
            spaces,
            apps,
            instances,
            compute,
            publisher,
            activity,
            related,
            orchestrator,
            app_service,
            inference,
        }
    }

    /// Quota currently consumed by [`OWNER`] on NPU.
    pub async fn npu_used(&self) -> u32 {
        self.ledger.used(OWNER, ComputeType::Npu).await
    }
}

/// A creation request for [`OWNER`].
pub fn request(name: &str, hardware: &str) -> CreateSpaceRequest {
    CreateSpaceRequest {
        owner: OWNER.to_string(),
        name: name.to_string(),
        hardware: hardware.to_string(),
        base_image: "python:3.11".to_string(),
        visibility: None,
        description: Some("test space".to_string()),
    }
}
