// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! spacehub Core - Space Lifecycle Orchestration
//!
//! This crate holds the domain logic behind Spaces: user-owned compute
//! workspaces backed by a repository and, optionally, by scarce hardware
//! quota. It sequences Space creation and deletion across external
//! collaborators, tracks the build/serve state of each Space commit, and
//! hands out leases on inference instances.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      spacehub-core (This Crate)                   │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │      Space       │  │    SpaceApp      │  │    Inference    │  │
//! │  │   Orchestrator   │  │  State Machine   │  │  Lease Manager  │  │
//! │  │  (saga + undo)   │  │  (CAS versions)  │  │ (reuse/provision│  │
//! │  └────────┬─────────┘  └────────┬─────────┘  └────────┬────────┘  │
//! └───────────┼─────────────────────┼─────────────────────┼───────────┘
//!             │                     │                     │
//!             ▼                     ▼                     ▼
//!   QuotaLedger, RepoProvider,  SpaceAppStore     InstanceStore, ComputeManager,
//!   WorkspaceStore, events                        RepoProvider, events
//! ```
//!
//! All collaborators are traits in [`collaborators`]; [`memory`] has
//! in-memory implementations with fault injection.
//!
//! # Space Creation Saga
//!
//! | Step | Action | On later failure |
//! |------|--------|------------------|
//! | `reserve-quota` | consume quota under a fresh bound id | release |
//! | `create-repo` | create the backing repository | delete repository |
//! | `save-space` | persist the Space record | delete record, emit `SpaceDeleted` |
//! | `bind-quota` | supply the reservation to the Space id | - |
//!
//! A failing compensation is reported as `Error::CompensationFailed`.
//!
//! # Inference Leases
//!
//! An instance is reused while it has at least `min_survival_time` left.
//! Concurrent provisioning for the same `(space, boot file hash)` is decided
//! by the instance store's version check; the loser re-reads once.
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SPACEHUB_MIN_SURVIVAL_SECS` | `300` | Minimum lease left for reuse |
//! | `SPACEHUB_EXTENSION_THRESHOLD_SECS` | `10` | Smallest extension worth writing |
//! | `SPACEHUB_PROVISIONING_TIMEOUT_SECS` | `600` | How long an unprovisioned instance is in flight |
//! | `SPACEHUB_DEFAULT_VISIBILITY` | `public` | Visibility of new repositories |
//! | `SPACEHUB_BOOT_FILE_DIR` | empty | Boot file directory |
//! | `SPACEHUB_BOOT_FILE` | `app.py` | Boot file name |

#![deny(missing_docs)]

/// SpaceApp state machine.
pub mod app;

/// SpaceApp service applying transitions under optimistic concurrency.
pub mod app_service;

/// Collaborator traits.
pub mod collaborators;

/// Configuration for the orchestrator and the lease manager.
pub mod config;

/// Error types.
pub mod error;

/// Domain events and activity records.
pub mod events;

/// Inference lease manager.
pub mod inference;

/// In-memory collaborators for tests and local runs.
pub mod memory;

/// Space lifecycle orchestrator.
pub mod orchestrator;

/// Compensating saga runner.
pub mod saga;

/// Space domain types.
pub mod space;

pub use app::{AppTransition, SpaceApp, SpaceAppIndex, SpaceAppStatus};
pub use app_service::SpaceAppService;
pub use config::{Config, LeaseConfig, SpaceConfig};
pub use error::{Error, Result};
pub use events::DomainEvent;
pub use inference::{BootFile, InferenceIndex, InferenceLease, InferenceService};
pub use orchestrator::{OrchestratorDeps, SpaceOrchestrator};
pub use space::{CreateSpaceRequest, Hardware, Space, SpaceIndex, Visibility};
