// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Space lifecycle orchestrator.
//!
//! Creation runs as a compensating saga:
//!
//! | Step            | Action                        | Compensation                      |
//! |-----------------|-------------------------------|-----------------------------------|
//! | `reserve-quota` | `QuotaLedger::consume`        | `QuotaLedger::release_bound`      |
//! | `create-repo`   | `RepoProvider::create`        | `RepoProvider::delete`            |
//! | `save-space`    | `WorkspaceStore::save`        | record delete + `SpaceDeleted`    |
//! | `bind-quota`    | `QuotaLedger::supply`         | -                                 |
//!
//! Deletion is a straight sequence that aborts on the first failure, except
//! for the NPU quota release, which is logged and skipped.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::collaborators::{
    ActivityLog, EventPublisher, QuotaLedger, RelatedResources, RepoProvider, WorkspaceStore,
};
use crate::config::SpaceConfig;
use crate::error::{Error, Result};
use crate::events::{ActivityKind, ActivityRecord, DomainEvent};
use crate::saga::{Saga, SagaStep};
use crate::space::{CreateSpaceRequest, Hardware, QuotaCost, Space, SpaceIndex, Visibility};

/// Sequences Space creation and deletion across the ledger, the repository
/// provider and the Workspace Store.
pub struct SpaceOrchestrator {
    ledger: Arc<dyn QuotaLedger>,
    repo: Arc<dyn RepoProvider>,
    store: Arc<dyn WorkspaceStore>,
    publisher: Arc<dyn EventPublisher>,
    activity: Arc<dyn ActivityLog>,
    related: Arc<dyn RelatedResources>,
    config: SpaceConfig,
}

/// Collaborators of a [`SpaceOrchestrator`].
pub struct OrchestratorDeps {
    /// Quota ledger.
    pub ledger: Arc<dyn QuotaLedger>,
    /// Repository provider.
    pub repo: Arc<dyn RepoProvider>,
    /// Space records.
    pub store: Arc<dyn WorkspaceStore>,
    /// Event transport.
    pub publisher: Arc<dyn EventPublisher>,
    /// Activity feed.
    pub activity: Arc<dyn ActivityLog>,
    /// Linked models and datasets.
    pub related: Arc<dyn RelatedResources>,
}

impl SpaceOrchestrator {
    /// Create a new orchestrator.
    pub fn new(deps: OrchestratorDeps, config: SpaceConfig) -> Self {
        Self {
            ledger: deps.ledger,
            repo: deps.repo,
            store: deps.store,
            publisher: deps.publisher,
            activity: deps.activity,
            related: deps.related,
            config,
        }
    }

    /// Create a Space.
    ///
    /// On failure every completed step is rolled back. If a rollback step
    /// fails too, `Error::CompensationFailed` is returned and the leftovers
    /// need operator attention.
    #[instrument(skip(self, request), fields(owner = %request.owner, name = %request.name))]
    pub async fn create(&self, request: CreateSpaceRequest) -> Result<Space> {
        let hardware = Hardware::parse(&request.hardware);
        let cost = hardware.quota_cost();
        if cost.compute_type.is_none() {
            warn!(hardware = %hardware.label(), "Unknown hardware, skipping quota ledger");
        }

        let mut ctx = Creation {
            owner: request.owner,
            name: request.name,
            visibility: request
                .visibility
                .unwrap_or(self.config.default_visibility),
            description: request.description,
            base_image: request.base_image,
            hardware,
            bound_id: uuid::Uuid::new_v4().to_string(),
            repo_id: None,
            space: None,
        };

        let saga = Saga::new("create-space")
            .step(ReserveQuota {
                ledger: self.ledger.clone(),
                cost,
            })
            .step(CreateRepo {
                repo: self.repo.clone(),
            })
            .step(SaveSpace {
                store: self.store.clone(),
                publisher: self.publisher.clone(),
            })
            .step(BindQuota {
                ledger: self.ledger.clone(),
                cost,
            });

        if let Err(failure) = saga.run(&mut ctx).await {
            let err = failure.into_error();
            if let Error::CompensationFailed { step, .. } = &err {
                error!(
                    owner = %ctx.owner,
                    name = %ctx.name,
                    bound_id = %ctx.bound_id,
                    space_id = ctx.space.as_ref().map(|s| s.id.as_str()).unwrap_or_default(),
                    repo_id = ctx.repo_id.as_deref().unwrap_or_default(),
                    failed_step = *step,
                    "Space creation left partial state behind"
                );
            }
            return Err(err);
        }

        let Some(space) = ctx.space else {
            return Err(Error::SpaceNotFound(ctx.name));
        };

        self.record_activity(&space, ActivityKind::Create).await;
        let event = DomainEvent::SpaceCreated {
            owner: space.owner.clone(),
            space_id: space.id.clone(),
            name: space.name.clone(),
            repo_id: space.repo_id.clone(),
        };
        if let Err(e) = self.publisher.publish(event).await {
            warn!(space_id = %space.id, error = %e, "Failed to publish space created event");
        }

        info!(space_id = %space.id, repo_id = %space.repo_id, "Space created");
        Ok(space)
    }

    /// Delete a Space.
    #[instrument(skip(self, space), fields(space_id = %space.id, owner = %space.owner))]
    pub async fn delete(&self, space: &Space, deleted_by: &str) -> Result<()> {
        self.repo.delete(&space.owner, &space.repo_id).await?;
        debug!(repo_id = %space.repo_id, "Repository deleted");

        let index = space.index();
        let resources = self.related.find(&index).await?;
        self.publisher
            .publish(DomainEvent::RelatedResourcesRemoved {
                owner: space.owner.clone(),
                space_id: space.id.clone(),
                resources,
            })
            .await?;

        if space.hardware.is_npu()
            && let QuotaCost {
                compute_type: Some(compute_type),
                count,
            } = space.hardware.quota_cost()
            && let Err(e) = self
                .ledger
                .release_bound(&space.owner, compute_type, count, &space.id)
                .await
        {
            warn!(error = %e, "Failed to release NPU quota, continuing deletion");
        }

        self.store.delete(&index).await?;

        self.publisher
            .publish(DomainEvent::SpaceDeleted {
                time: Utc::now(),
                owner: space.owner.clone(),
                name: space.name.clone(),
                deleted_by: deleted_by.to_string(),
                repo_id: space.repo_id.clone(),
            })
            .await?;

        self.record_activity(space, ActivityKind::Delete).await;
        info!("Space deleted");
        Ok(())
    }

    /// Look up a Space.
    pub async fn get(&self, index: &SpaceIndex) -> Result<Space> {
        self.store
            .find(index)
            .await?
            .ok_or_else(|| Error::SpaceNotFound(index.to_string()))
    }

    /// Look up a Space and delete it.
    pub async fn delete_by_index(&self, index: &SpaceIndex, deleted_by: &str) -> Result<()> {
        let space = self.get(index).await?;
        self.delete(&space, deleted_by).await
    }

    async fn record_activity(&self, space: &Space, kind: ActivityKind) {
        let record = ActivityRecord {
            owner: space.owner.clone(),
            kind,
            space_id: space.id.clone(),
            space_name: space.name.clone(),
            time: Utc::now(),
        };
        if let Err(e) = self.activity.append(record).await {
            warn!(space_id = %space.id, error = %e, "Failed to append activity record");
        }
    }
}

struct Creation {
    owner: String,
    name: String,
    visibility: Visibility,
    description: Option<String>,
    base_image: String,
    hardware: Hardware,
    bound_id: String,
    repo_id: Option<String>,
    space: Option<Space>,
}

struct ReserveQuota {
    ledger: Arc<dyn QuotaLedger>,
    cost: QuotaCost,
}

#[async_trait]
impl SagaStep<Creation> for ReserveQuota {
    fn name(&self) -> &'static str {
        "reserve-quota"
    }

    fn has_compensation(&self) -> bool {
        self.cost.compute_type.is_some()
    }

    async fn execute(&self, ctx: &mut Creation) -> Result<()> {
        let Some(compute_type) = self.cost.compute_type else {
            return Ok(());
        };
        self.ledger
            .consume(&ctx.owner, compute_type, self.cost.count, &ctx.bound_id)
            .await
    }

    async fn compensate(&self, ctx: &Creation) -> Result<()> {
        let Some(compute_type) = self.cost.compute_type else {
            return Ok(());
        };
        self.ledger
            .release_bound(&ctx.owner, compute_type, self.cost.count, &ctx.bound_id)
            .await
    }
}

struct CreateRepo {
    repo: Arc<dyn RepoProvider>,
}

#[async_trait]
impl SagaStep<Creation> for CreateRepo {
    fn name(&self) -> &'static str {
        "create-repo"
    }

    async fn execute(&self, ctx: &mut Creation) -> Result<()> {
        let repo_id = self
            .repo
            .create(&ctx.owner, &ctx.name, ctx.visibility)
            .await
            .map_err(|e| Error::RepoProvisionFailed {
                name: ctx.name.clone(),
                reason: e.to_string(),
            })?;
        ctx.repo_id = Some(repo_id);
        Ok(())
    }

    async fn compensate(&self, ctx: &Creation) -> Result<()> {
        match &ctx.repo_id {
            Some(repo_id) => self.repo.delete(&ctx.owner, repo_id).await,
            None => Ok(()),
        }
    }
}

struct SaveSpace {
    store: Arc<dyn WorkspaceStore>,
    publisher: Arc<dyn EventPublisher>,
}

#[async_trait]
impl SagaStep<Creation> for SaveSpace {
    fn name(&self) -> &'static str {
        "save-space"
    }

    async fn execute(&self, ctx: &mut Creation) -> Result<()> {
        let Some(repo_id) = ctx.repo_id.clone() else {
            return Err(Error::SpacePersistFailed {
                name: ctx.name.clone(),
                reason: "no repository id".to_string(),
            });
        };
        let space = Space {
            id: uuid::Uuid::new_v4().to_string(),
            owner: ctx.owner.clone(),
            name: ctx.name.clone(),
            repo_id,
            hardware: ctx.hardware.clone(),
            base_image: ctx.base_image.clone(),
            visibility: ctx.visibility,
            description: ctx.description.clone(),
            commit_id: None,
            no_application_file: false,
            exception: None,
            comp_power_allocated: ctx.hardware.is_npu(),
            version: 0,
            created_at: Utc::now(),
        };
        let saved = self
            .store
            .save(&space)
            .await
            .map_err(|e| Error::SpacePersistFailed {
                name: ctx.name.clone(),
                reason: e.to_string(),
            })?;
        ctx.space = Some(saved);
        Ok(())
    }

    async fn compensate(&self, ctx: &Creation) -> Result<()> {
        let Some(space) = &ctx.space else {
            return Ok(());
        };
        self.store.delete(&space.index()).await?;
        self.publisher
            .publish(DomainEvent::SpaceDeleted {
                time: Utc::now(),
                owner: space.owner.clone(),
                name: space.name.clone(),
                deleted_by: space.owner.clone(),
                repo_id: space.repo_id.clone(),
            })
            .await
    }
}

struct BindQuota {
    ledger: Arc<dyn QuotaLedger>,
    cost: QuotaCost,
}

#[async_trait]
impl SagaStep<Creation> for BindQuota {
    fn name(&self) -> &'static str {
        "bind-quota"
    }

    fn has_compensation(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut Creation) -> Result<()> {
        let Some(compute_type) = self.cost.compute_type else {
            return Ok(());
        };
        let Some(space) = &ctx.space else {
            return Err(Error::SpaceNotFound(ctx.name.clone()));
        };
        self.ledger
            .supply(
                &ctx.owner,
                compute_type,
                &ctx.bound_id,
                self.cost.count,
                &space.id,
            )
            .await
            .map_err(|e| Error::QuotaBindingFailed {
                space_id: space.id.clone(),
                reason: e.to_string(),
            })
    }
}
