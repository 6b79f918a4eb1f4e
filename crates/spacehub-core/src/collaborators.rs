// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Collaborator trait definitions.
//!
//! The core only talks to the quota ledger, the repository provider, the
//! stores, the compute manager and the event transport through these traits.
//! Implementations are expected to be cheap to share behind `Arc<dyn _>`.
//!
//! Collaborators are PURE adapters - they do not sequence or compensate.
//! Ordering and rollback are the orchestrator's job.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::{SpaceApp, SpaceAppIndex};
use crate::error::Result;
use crate::events::{ActivityRecord, DomainEvent, RelatedResource};
use crate::inference::{InferenceDetail, InferenceIndex, InferenceInstance};
use crate::space::{ComputeType, Space, SpaceIndex, Visibility};

/// Per-user, per-hardware quota accounting.
///
/// Each operation must be an atomic read-modify-write of the
/// `(user, compute_type)` row.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Reserve `count` units, bound to `bound_id` until the resource exists.
    async fn consume(
        &self,
        user: &str,
        compute_type: ComputeType,
        count: u32,
        bound_id: &str,
    ) -> Result<()>;

    /// Tie the reservation made under `bound_id` to the real Space id.
    async fn supply(
        &self,
        user: &str,
        compute_type: ComputeType,
        bound_id: &str,
        count: u32,
        space_id: &str,
    ) -> Result<()>;

    /// Give back `count` units.
    async fn release(&self, user: &str, compute_type: ComputeType, count: u32) -> Result<()>;

    /// Give back the `count` units held under `resource_id`: the bound id
    /// before `supply`, the Space id after it.
    ///
    /// Ledgers that do not track bindings fall back to [`QuotaLedger::release`].
    async fn release_bound(
        &self,
        user: &str,
        compute_type: ComputeType,
        count: u32,
        resource_id: &str,
    ) -> Result<()> {
        let _ = resource_id;
        self.release(user, compute_type, count).await
    }
}

/// Version-controlled repository backend.
#[async_trait]
pub trait RepoProvider: Send + Sync {
    /// Create a repository and return its opaque id.
    async fn create(&self, owner: &str, name: &str, visibility: Visibility) -> Result<String>;

    /// Delete a repository.
    async fn delete(&self, owner: &str, repo_id: &str) -> Result<()>;

    /// Content hash of `dir/file`, or `None` when the file does not exist.
    async fn get_dir_file_info(
        &self,
        owner: &str,
        repo_id: &str,
        dir: &str,
        file: &str,
    ) -> Result<Option<String>>;
}

/// Durable Space records.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Insert a Space and return the stored record.
    async fn save(&self, space: &Space) -> Result<Space>;

    /// Look up a Space.
    async fn find(&self, index: &SpaceIndex) -> Result<Option<Space>>;

    /// Delete a Space record.
    async fn delete(&self, index: &SpaceIndex) -> Result<()>;
}

/// Durable SpaceApp records with compare-and-set updates.
#[async_trait]
pub trait SpaceAppStore: Send + Sync {
    /// Look up an app.
    async fn find(&self, index: &SpaceAppIndex) -> Result<Option<SpaceApp>>;

    /// Insert a new app. Fails with a conflict if the index already exists.
    async fn insert(&self, app: &SpaceApp) -> Result<SpaceApp>;

    /// Write `app` if the stored version still equals `expected_version`.
    ///
    /// Returns the stored app with its bumped version, or
    /// `Error::StaleOptimisticVersion`.
    async fn update(&self, app: &SpaceApp, expected_version: u64) -> Result<SpaceApp>;
}

/// Inference instance records.
///
/// Instances are grouped by `(space, last_commit)`; each group carries a
/// version that every successful insert bumps. This is the uniqueness
/// guarantee the lease manager relies on.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Insert `instance` if its group is still at `expected_version`.
    ///
    /// Returns the instance id, or `Error::DuplicateInstanceCreation` when
    /// another caller inserted first.
    async fn save(&self, instance: &InferenceInstance, expected_version: u64) -> Result<String>;

    /// All instances of a group plus the group's current version.
    async fn find_instances(
        &self,
        space: &SpaceIndex,
        last_commit: &str,
    ) -> Result<(Vec<InferenceInstance>, u64)>;

    /// Apply the set fields of `detail` to one instance.
    async fn update_detail(&self, index: &InferenceIndex, detail: &InferenceDetail) -> Result<()>;
}

/// What a compute manager reports after starting an instance.
#[derive(Debug, Clone)]
pub struct LaunchedInference {
    /// URL serving traffic.
    pub access_url: String,
    /// How long the instance lives without an extension.
    pub survival_time: Duration,
}

/// Underlying container platform.
#[async_trait]
pub trait ComputeManager: Send + Sync {
    /// Start a serving container.
    async fn launch(
        &self,
        index: &InferenceIndex,
        base_image: &str,
        hardware: &str,
    ) -> Result<LaunchedInference>;

    /// Survival time granted per extension for this instance.
    async fn survival_time(&self, index: &InferenceIndex) -> Result<Duration>;

    /// Push the real resource's expiry out to `expiry`.
    async fn extend_survival_time(
        &self,
        index: &InferenceIndex,
        expiry: DateTime<Utc>,
    ) -> Result<()>;
}

/// Outbound event transport.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand an event to the transport.
    async fn publish(&self, event: DomainEvent) -> Result<()>;
}

/// User activity feed.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Append one record.
    async fn append(&self, record: ActivityRecord) -> Result<()>;
}

/// Lookup of models and datasets linked to a Space.
#[async_trait]
pub trait RelatedResources: Send + Sync {
    /// Resources linked to `space`.
    async fn find(&self, space: &SpaceIndex) -> Result<Vec<RelatedResource>>;
}
