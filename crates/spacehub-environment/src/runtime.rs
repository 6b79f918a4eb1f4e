// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for spacehub-environment.
//!
//! [`SpaceRuntime`] wires the core services to their collaborators, owns the
//! event channel and runs the [`EventDispatcher`] in the background.
//!
//! # Example
//!
//! ```rust,ignore
//! use spacehub_environment::config::Config;
//! use spacehub_environment::runtime::SpaceRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!
//!     let runtime = SpaceRuntime::standalone(&config)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     let space = runtime.orchestrator().create(request).await?;
//!     let lease = runtime.create_inference(&space).await?;
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use spacehub_core::collaborators::{
    ActivityLog, ComputeManager, InstanceStore, QuotaLedger, RelatedResources, RepoProvider,
    SpaceAppStore, WorkspaceStore,
};
use spacehub_core::memory::{
    MemoryActivityLog, MemoryInstanceStore, MemoryQuotaLedger, MemoryRelatedResources,
    MemoryRepoProvider, MemorySpaceAppStore, MemoryWorkspaceStore, MockComputeManager,
};
use spacehub_core::space::ComputeType;
use spacehub_core::{
    BootFile, InferenceLease, InferenceService, OrchestratorDeps, Space, SpaceAppService,
    SpaceOrchestrator,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::dispatcher::EventDispatcher;
use crate::extension::ExtensionWorker;
use crate::provisioning::ProvisioningWorker;
use crate::publisher::ChannelPublisher;

/// Builder for [`SpaceRuntime`].
#[derive(Default)]
pub struct SpaceRuntimeBuilder {
    config: Config,
    ledger: Option<Arc<dyn QuotaLedger>>,
    repo: Option<Arc<dyn RepoProvider>>,
    spaces: Option<Arc<dyn WorkspaceStore>>,
    apps: Option<Arc<dyn SpaceAppStore>>,
    instances: Option<Arc<dyn InstanceStore>>,
    compute: Option<Arc<dyn ComputeManager>>,
    activity: Option<Arc<dyn ActivityLog>>,
    related: Option<Arc<dyn RelatedResources>>,
}

impl SpaceRuntimeBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the quota ledger (required).
    pub fn ledger(mut self, ledger: Arc<dyn QuotaLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Set the repository provider (required).
    pub fn repo(mut self, repo: Arc<dyn RepoProvider>) -> Self {
        self.repo = Some(repo);
        self
    }

    /// Set the Space record store (required).
    pub fn spaces(mut self, spaces: Arc<dyn WorkspaceStore>) -> Self {
        self.spaces = Some(spaces);
        self
    }

    /// Set the SpaceApp store (required).
    pub fn apps(mut self, apps: Arc<dyn SpaceAppStore>) -> Self {
        self.apps = Some(apps);
        self
    }

    /// Set the inference instance store (required).
    pub fn instances(mut self, instances: Arc<dyn InstanceStore>) -> Self {
        self.instances = Some(instances);
        self
    }

    /// Set the compute manager (required).
    pub fn compute(mut self, compute: Arc<dyn ComputeManager>) -> Self {
        self.compute = Some(compute);
        self
    }

    /// Set the activity feed (required).
    pub fn activity(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Set the related resource lookup (required).
    pub fn related(mut self, related: Arc<dyn RelatedResources>) -> Self {
        self.related = Some(related);
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if a required collaborator is missing.
    pub fn build(self) -> Result<SpaceRuntimeConfig> {
        let ledger = self
            .ledger
            .ok_or_else(|| anyhow::anyhow!("ledger is required"))?;
        let repo = self
            .repo
            .ok_or_else(|| anyhow::anyhow!("repo is required"))?;
        let spaces = self
            .spaces
            .ok_or_else(|| anyhow::anyhow!("spaces is required"))?;
        let apps = self
            .apps
            .ok_or_else(|| anyhow::anyhow!("apps is required"))?;
        let instances = self
            .instances
            .ok_or_else(|| anyhow::anyhow!("instances is required"))?;
        let compute = self
            .compute
            .ok_or_else(|| anyhow::anyhow!("compute is required"))?;
        let activity = self
            .activity
            .ok_or_else(|| anyhow::anyhow!("activity is required"))?;
        let related = self
            .related
            .ok_or_else(|| anyhow::anyhow!("related is required"))?;

        Ok(SpaceRuntimeConfig {
            config: self.config,
            ledger,
            repo,
            spaces,
            apps,
            instances,
            compute,
            activity,
            related,
        })
    }
}

/// Validated configuration for [`SpaceRuntime`].
pub struct SpaceRuntimeConfig {
    config: Config,
    ledger: Arc<dyn QuotaLedger>,
    repo: Arc<dyn RepoProvider>,
    spaces: Arc<dyn WorkspaceStore>,
    apps: Arc<dyn SpaceAppStore>,
    instances: Arc<dyn InstanceStore>,
    compute: Arc<dyn ComputeManager>,
    activity: Arc<dyn ActivityLog>,
    related: Arc<dyn RelatedResources>,
}

impl SpaceRuntimeConfig {
    /// Start the runtime.
    ///
    /// Creates the event channel and the services, then spawns the
    /// dispatcher.
    pub async fn start(self) -> Result<SpaceRuntime> {
        let (publisher, rx) = ChannelPublisher::channel(self.config.event_channel_capacity);
        let publisher = Arc::new(publisher);

        let orchestrator = Arc::new(SpaceOrchestrator::new(
            OrchestratorDeps {
                ledger: self.ledger,
                repo: self.repo.clone(),
                store: self.spaces,
                publisher: publisher.clone(),
                activity: self.activity,
                related: self.related,
            },
            self.config.core.space.clone(),
        ));
        let app_service = Arc::new(SpaceAppService::new(self.apps));
        let inference = Arc::new(InferenceService::new(
            self.repo,
            self.instances,
            self.compute.clone(),
            publisher,
            self.config.core.lease.clone(),
        ));

        let dispatcher = EventDispatcher::new(
            rx,
            Arc::new(ProvisioningWorker::new(self.compute, inference.clone())),
            Arc::new(ExtensionWorker::new(inference.clone())),
        );
        let dispatcher_shutdown = dispatcher.shutdown_handle();
        let dispatcher_handle = tokio::spawn(async move {
            dispatcher.run().await;
        });

        info!(
            event_channel_capacity = self.config.event_channel_capacity,
            min_survival_secs = self.config.core.lease.min_survival_time.as_secs(),
            "SpaceRuntime started"
        );

        Ok(SpaceRuntime {
            orchestrator,
            app_service,
            inference,
            boot_file: BootFile::from_config(&self.config.core.space),
            dispatcher_handle,
            dispatcher_shutdown,
        })
    }
}

/// Running Space lifecycle runtime.
pub struct SpaceRuntime {
    orchestrator: Arc<SpaceOrchestrator>,
    app_service: Arc<SpaceAppService>,
    inference: Arc<InferenceService>,
    boot_file: BootFile,
    dispatcher_handle: JoinHandle<()>,
    dispatcher_shutdown: Arc<Notify>,
}

impl SpaceRuntime {
    /// Create a new runtime builder.
    pub fn builder() -> SpaceRuntimeBuilder {
        SpaceRuntimeBuilder::new()
    }

    /// Builder wired to in-memory collaborators.
    ///
    /// Every user gets `standalone_npu_quota` NPU units and the compute
    /// manager grants `standalone_survival_time` per launch.
    pub fn standalone(config: &Config) -> SpaceRuntimeBuilder {
        let ledger = MemoryQuotaLedger::new()
            .with_default_total(ComputeType::Npu, config.standalone_npu_quota);

        SpaceRuntimeBuilder::new()
            .config(config.clone())
            .ledger(Arc::new(ledger))
            .repo(Arc::new(MemoryRepoProvider::new()))
            .spaces(Arc::new(MemoryWorkspaceStore::new()))
            .apps(Arc::new(MemorySpaceAppStore::new()))
            .instances(Arc::new(MemoryInstanceStore::new()))
            .compute(Arc::new(MockComputeManager::new(
                config.standalone_survival_time,
            )))
            .activity(Arc::new(MemoryActivityLog::new()))
            .related(Arc::new(MemoryRelatedResources::new()))
    }

    /// Space creation and deletion.
    pub fn orchestrator(&self) -> &Arc<SpaceOrchestrator> {
        &self.orchestrator
    }

    /// SpaceApp state machine.
    pub fn app_service(&self) -> &Arc<SpaceAppService> {
        &self.app_service
    }

    /// Inference lease manager.
    pub fn inference(&self) -> &Arc<InferenceService> {
        &self.inference
    }

    /// Get an inference lease for `space` using the configured boot file.
    pub async fn create_inference(&self, space: &Space) -> spacehub_core::Result<InferenceLease> {
        self.inference.create(space, &self.boot_file).await
    }

    /// Shutdown the runtime gracefully.
    ///
    /// Events already queued are dispatched before this returns.
    pub async fn shutdown(self) -> Result<()> {
        info!("SpaceRuntime shutting down...");

        self.dispatcher_shutdown.notify_one();

        if let Err(e) = self.dispatcher_handle.await {
            error!("Event dispatcher task panicked: {}", e);
            return Err(anyhow::anyhow!("event dispatcher task panicked: {}", e));
        }

        info!("SpaceRuntime shutdown complete");
        Ok(())
    }

    /// Check if the dispatcher is still running.
    pub fn is_running(&self) -> bool {
        !self.dispatcher_handle.is_finished()
    }
}
