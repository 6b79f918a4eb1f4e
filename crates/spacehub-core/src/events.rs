// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound domain events and activity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inference::InferenceIndex;

/// A model or dataset linked to a Space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedResource {
    /// Owner of the resource.
    pub owner: String,
    /// Resource id.
    pub id: String,
    /// Resource kind, e.g. "model" or "dataset".
    pub kind: String,
}

/// Events emitted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A Space finished its creation saga.
    SpaceCreated {
        /// Space owner.
        owner: String,
        /// Space id.
        space_id: String,
        /// Space name.
        name: String,
        /// Backing repository id.
        repo_id: String,
    },
    /// A Space was deleted.
    SpaceDeleted {
        /// When the deletion happened.
        time: DateTime<Utc>,
        /// Space owner.
        owner: String,
        /// Space name.
        name: String,
        /// Account that requested the deletion.
        deleted_by: String,
        /// Backing repository id.
        repo_id: String,
    },
    /// Resources linked to a deleted Space must drop the link.
    RelatedResourcesRemoved {
        /// Space owner.
        owner: String,
        /// Space id.
        space_id: String,
        /// Linked resources.
        resources: Vec<RelatedResource>,
    },
    /// A new inference instance must be provisioned.
    InferenceRequested {
        /// Instance key.
        index: InferenceIndex,
        /// Base image to serve from.
        base_image: String,
        /// Hardware label.
        hardware: String,
    },
    /// A reused inference instance should have its lease extended.
    ExtendSurvivalRequested {
        /// Instance key.
        index: InferenceIndex,
        /// Expiry observed when the instance was reused.
        expiry: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SpaceCreated { .. } => "space_created",
            Self::SpaceDeleted { .. } => "space_deleted",
            Self::RelatedResourcesRemoved { .. } => "related_resources_removed",
            Self::InferenceRequested { .. } => "inference_requested",
            Self::ExtendSurvivalRequested { .. } => "extend_survival_requested",
        }
    }

    /// Serialize to the JSON payload carried on the wire.
    pub fn to_payload(&self) -> crate::error::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Kind of user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Resource created.
    Create,
    /// Resource deleted.
    Delete,
}

/// One entry of a user's activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Account the activity belongs to.
    pub owner: String,
    /// What happened.
    pub kind: ActivityKind,
    /// Space id.
    pub space_id: String,
    /// Space name.
    pub space_name: String,
    /// When it happened.
    pub time: DateTime<Utc>,
}
