// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SpaceHub Environment - Space Lifecycle Runtime
//!
//! Hosts the core services and the background work their events trigger.
//!
//! # Architecture
//!
//! ```text
//!  SpaceOrchestrator ──┐
//!  InferenceService ───┼──► ChannelPublisher ──► mpsc ──► EventDispatcher
//!                      │                                   │
//!                      │            InferenceRequested ────┼──► ProvisioningWorker
//!                      │       ExtendSurvivalRequested ────┼──► ExtensionWorker
//!                      │                  other events ────┴──► log
//!                      │
//!  ProvisioningWorker ─┴──► InferenceService::record_provisioned / record_failure
//! ```
//!
//! Publishing never blocks the caller. When the channel is full the event
//! is rejected and the publishing operation handles it like any other
//! publish failure.
//!
//! # Configuration
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `SPACEHUB_EVENT_CHANNEL_CAPACITY` | 1024 | Events buffered for the dispatcher |
//! | `SPACEHUB_STANDALONE_NPU_QUOTA` | 1 | NPU units per user in standalone mode |
//! | `SPACEHUB_STANDALONE_SURVIVAL_SECS` | 3600 | Lifetime granted by the standalone compute manager |
//!
//! plus the `SPACEHUB_*` variables read by `spacehub_core::Config`.

#![deny(missing_docs)]

/// Configuration loaded from the environment.
pub mod config;
/// Routing of domain events to workers.
pub mod dispatcher;
/// Environment error type.
pub mod error;
/// Lease extension worker.
pub mod extension;
/// Inference provisioning worker.
pub mod provisioning;
/// Channel-backed event publisher.
pub mod publisher;
/// Embeddable runtime.
pub mod runtime;

pub use config::Config;
pub use error::{Error, Result};
pub use runtime::SpaceRuntime;
