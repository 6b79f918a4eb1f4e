// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inference lease manager.
//!
//! An inference instance is keyed by `(space, boot file content hash)`.
//! [`InferenceService::create`] hands out a lease on an existing instance when
//! one is alive long enough, and otherwise inserts a new instance and asks the
//! provisioning pipeline to start it.
//!
//! # Lease rules
//!
//! | Stored state                                         | Outcome                       |
//! |------------------------------------------------------|-------------------------------|
//! | any instance has an error                            | `DeadInference`, no provision |
//! | latest expiry `e` with `now + min_survival <= e`     | reuse, request an extension   |
//! | instance without expiry, younger than the timeout    | in-flight, return it          |
//! | otherwise                                            | provision a new instance      |
//!
//! Only one provisioning attempt can win per key and store version. The loser
//! re-reads once and converges on the winner's instance.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::{ComputeManager, EventPublisher, InstanceStore, RepoProvider};
use crate::config::{LeaseConfig, SpaceConfig};
use crate::error::{Error, Result};
use crate::events::DomainEvent;
use crate::space::{Space, SpaceIndex};

/// Key of one inference instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InferenceIndex {
    /// Space the instance serves.
    pub space: SpaceIndex,
    /// Content hash of the boot file the instance was built from.
    pub last_commit: String,
    /// Instance id.
    pub id: String,
}

impl std::fmt::Display for InferenceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}#{}", self.space, self.last_commit, self.id)
    }
}

/// Stored inference instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceInstance {
    /// Instance key.
    pub index: InferenceIndex,
    /// Lease end. `None` while provisioning.
    pub expiry: Option<DateTime<Utc>>,
    /// URL serving traffic, once provisioned.
    pub access_url: Option<String>,
    /// Terminal error reported by the provisioning pipeline.
    pub error: Option<String>,
    /// When the instance was inserted.
    pub created_at: DateTime<Utc>,
}

impl InferenceInstance {
    /// A fresh instance awaiting provisioning.
    pub fn pending(space: SpaceIndex, last_commit: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            index: InferenceIndex {
                space,
                last_commit: last_commit.into(),
                id: uuid::Uuid::new_v4().to_string(),
            },
            expiry: None,
            access_url: None,
            error: None,
            created_at: now,
        }
    }

    /// Apply the set fields of `detail`.
    pub fn apply_detail(&mut self, detail: &InferenceDetail) {
        if let Some(expiry) = detail.expiry {
            self.expiry = Some(expiry);
        }
        if let Some(url) = &detail.access_url {
            self.access_url = Some(url.clone());
        }
        if let Some(error) = &detail.error {
            self.error = Some(error.clone());
        }
    }

    /// An instance with a non-empty error is permanently dead.
    pub fn is_dead(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    fn lease(&self, newly_provisioned: bool) -> InferenceLease {
        InferenceLease {
            index: self.index.clone(),
            access_url: self.access_url.clone(),
            expiry: self.expiry,
            newly_provisioned,
        }
    }
}

/// Partial update of an instance. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceDetail {
    /// New lease end.
    pub expiry: Option<DateTime<Utc>>,
    /// Serving URL.
    pub access_url: Option<String>,
    /// Terminal error.
    pub error: Option<String>,
}

/// What a caller of [`InferenceService::create`] gets back.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceLease {
    /// Instance key.
    pub index: InferenceIndex,
    /// URL serving traffic. `None` while provisioning.
    pub access_url: Option<String>,
    /// Lease end. `None` while provisioning.
    pub expiry: Option<DateTime<Utc>>,
    /// True when this call inserted the instance.
    pub newly_provisioned: bool,
}

/// Outcome of inspecting the stored instances of one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeaseDecision<'a> {
    /// An instance failed; nothing may be reused or provisioned.
    Dead(&'a InferenceInstance),
    /// An instance is alive for at least the minimum survival time.
    Reuse(&'a InferenceInstance),
    /// An instance is still being provisioned.
    InFlight(&'a InferenceInstance),
    /// Nothing usable; a new instance is needed.
    Provision,
}

/// Decide what to do with the stored instances of one key at `now`.
pub fn evaluate_lease<'a>(
    instances: &'a [InferenceInstance],
    now: DateTime<Utc>,
    config: &LeaseConfig,
) -> LeaseDecision<'a> {
    if let Some(dead) = instances.iter().find(|i| i.is_dead()) {
        return LeaseDecision::Dead(dead);
    }

    let latest = instances
        .iter()
        .filter_map(|i| i.expiry.map(|e| (e, i)))
        .max_by_key(|(e, _)| *e);
    if let Some((expiry, instance)) = latest
        && now < expiry
        && let Some(needed) = add_duration(now, config.min_survival_time)
        && needed <= expiry
    {
        return LeaseDecision::Reuse(instance);
    }

    let pending = instances
        .iter()
        .filter(|i| i.expiry.is_none())
        .filter(|i| add_duration(i.created_at, config.provisioning_timeout).is_none_or(|t| now < t))
        .max_by_key(|i| i.created_at);
    if let Some(instance) = pending {
        return LeaseDecision::InFlight(instance);
    }

    LeaseDecision::Provision
}

fn add_duration(at: DateTime<Utc>, d: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
}

/// Where the boot file lives inside a Space repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootFile {
    /// Directory, empty for the repository root.
    pub dir: String,
    /// File name.
    pub file: String,
}

impl BootFile {
    /// Boot file location from configuration.
    pub fn from_config(config: &SpaceConfig) -> Self {
        Self {
            dir: config.boot_file_dir.clone(),
            file: config.boot_file_name.clone(),
        }
    }
}

/// Hands out and maintains inference leases.
pub struct InferenceService {
    repo: Arc<dyn RepoProvider>,
    store: Arc<dyn InstanceStore>,
    compute: Arc<dyn ComputeManager>,
    publisher: Arc<dyn EventPublisher>,
    config: LeaseConfig,
}

impl InferenceService {
    /// Create a new lease manager.
    pub fn new(
        repo: Arc<dyn RepoProvider>,
        store: Arc<dyn InstanceStore>,
        compute: Arc<dyn ComputeManager>,
        publisher: Arc<dyn EventPublisher>,
        config: LeaseConfig,
    ) -> Self {
        Self {
            repo,
            store,
            compute,
            publisher,
            config,
        }
    }

    /// Lease configuration.
    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Get a lease on an inference instance for `space`.
    pub async fn create(&self, space: &Space, boot_file: &BootFile) -> Result<InferenceLease> {
        let last_commit = self
            .repo
            .get_dir_file_info(&space.owner, &space.repo_id, &boot_file.dir, &boot_file.file)
            .await?
            .ok_or_else(|| Error::UnavailableRepoFile {
                user: space.owner.clone(),
                dir: boot_file.dir.clone(),
                file: boot_file.file.clone(),
            })?;

        let index = space.index();
        let (existing, version) = self.check(&index, &last_commit).await?;
        if let Some(lease) = existing {
            return Ok(lease);
        }

        let candidate = InferenceInstance::pending(index.clone(), &last_commit, Utc::now());
        match self.store.save(&candidate, version).await {
            Ok(_) => {}
            Err(e @ Error::DuplicateInstanceCreation { .. }) => {
                debug!(
                    space = %index,
                    last_commit = %last_commit,
                    "Lost instance creation race, re-checking"
                );
                let (existing, _) = self.check(&index, &last_commit).await?;
                return existing.ok_or(e);
            }
            Err(e) => return Err(e),
        }

        let event = DomainEvent::InferenceRequested {
            index: candidate.index.clone(),
            base_image: space.base_image.clone(),
            hardware: space.hardware.label().to_string(),
        };
        if let Err(e) = self.publisher.publish(event).await {
            warn!(
                instance = %candidate.index,
                error = %e,
                "Failed to request provisioning, abandoning instance"
            );
            // Expire the candidate so the next call provisions again.
            let abandon = InferenceDetail {
                expiry: Some(candidate.created_at),
                ..Default::default()
            };
            if let Err(e) = self.store.update_detail(&candidate.index, &abandon).await {
                warn!(instance = %candidate.index, error = %e, "Failed to abandon instance");
            }
            return Err(e);
        }

        info!(instance = %candidate.index, "Inference instance requested");
        Ok(candidate.lease(true))
    }

    async fn check(
        &self,
        space: &SpaceIndex,
        last_commit: &str,
    ) -> Result<(Option<InferenceLease>, u64)> {
        let (instances, version) = self.store.find_instances(space, last_commit).await?;

        match evaluate_lease(&instances, Utc::now(), &self.config) {
            LeaseDecision::Dead(instance) => Err(Error::DeadInference {
                instance_id: instance.index.id.clone(),
                error: instance.error.clone().unwrap_or_default(),
            }),
            LeaseDecision::Reuse(instance) => {
                if let Some(expiry) = instance.expiry {
                    let event = DomainEvent::ExtendSurvivalRequested {
                        index: instance.index.clone(),
                        expiry,
                    };
                    if let Err(e) = self.publisher.publish(event).await {
                        warn!(
                            instance = %instance.index,
                            error = %e,
                            "Failed to request lease extension"
                        );
                    }
                }
                Ok((Some(instance.lease(false)), version))
            }
            LeaseDecision::InFlight(instance) => Ok((Some(instance.lease(false)), version)),
            LeaseDecision::Provision => Ok((None, version)),
        }
    }

    /// Extend the lease of `index`, claimed to currently end at `claim`.
    ///
    /// Claims already in the past and extensions gaining less than the
    /// threshold are no-ops.
    pub async fn extend_survival_time(
        &self,
        index: &InferenceIndex,
        claim: DateTime<Utc>,
    ) -> Result<()> {
        let now = Utc::now();
        if claim < now {
            debug!(instance = %index, claim = %claim, "Ignoring extension of expired lease");
            return Ok(());
        }

        let survival = self.compute.survival_time(index).await?;
        let Some(new_expiry) = add_duration(now, survival) else {
            return Err(Error::Compute(format!(
                "survival time {survival:?} out of range"
            )));
        };

        let gain = (new_expiry - claim).to_std().unwrap_or_default();
        if gain < self.config.extension_threshold {
            debug!(
                instance = %index,
                gain_ms = gain.as_millis() as u64,
                "Extension below threshold, skipping"
            );
            return Ok(());
        }

        self.compute.extend_survival_time(index, new_expiry).await?;
        self.store
            .update_detail(
                index,
                &InferenceDetail {
                    expiry: Some(new_expiry),
                    ..Default::default()
                },
            )
            .await?;

        debug!(instance = %index, expiry = %new_expiry, "Lease extended");
        Ok(())
    }

    /// Record a successful launch reported by the provisioning pipeline.
    pub async fn record_provisioned(
        &self,
        index: &InferenceIndex,
        access_url: &str,
        survival_time: Duration,
    ) -> Result<()> {
        let expiry = add_duration(Utc::now(), survival_time).ok_or_else(|| {
            Error::Compute(format!("survival time {survival_time:?} out of range"))
        })?;
        self.store
            .update_detail(
                index,
                &InferenceDetail {
                    expiry: Some(expiry),
                    access_url: Some(access_url.to_string()),
                    error: None,
                },
            )
            .await?;
        info!(instance = %index, access_url = %access_url, "Inference instance serving");
        Ok(())
    }

    /// Record a terminal provisioning failure.
    pub async fn record_failure(&self, index: &InferenceIndex, error: &str) -> Result<()> {
        self.store
            .update_detail(
                index,
                &InferenceDetail {
                    error: Some(error.to_string()),
                    ..Default::default()
                },
            )
            .await?;
        warn!(instance = %index, error = %error, "Inference instance failed");
        Ok(())
    }
}
