// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Event dispatcher routing domain events to background workers.
//!
//! The dispatcher drains the channel fed by
//! [`ChannelPublisher`](crate::publisher::ChannelPublisher):
//! - `InferenceRequested` goes to the [`ProvisioningWorker`]
//! - `ExtendSurvivalRequested` goes to the [`ExtensionWorker`]
//! - everything else is logged for downstream consumers
//!
//! Each worker call runs in its own task so a slow launch does not hold up
//! extensions. On shutdown, events already queued are still dispatched and
//! in-flight tasks are awaited before `run` returns.

use std::sync::Arc;

use spacehub_core::DomainEvent;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::extension::ExtensionWorker;
use crate::provisioning::ProvisioningWorker;

/// Routes events to workers until shut down or the channel closes.
pub struct EventDispatcher {
    rx: mpsc::Receiver<DomainEvent>,
    provisioning: Arc<ProvisioningWorker>,
    extension: Arc<ExtensionWorker>,
    shutdown: Arc<Notify>,
}

impl EventDispatcher {
    /// Create a new dispatcher.
    pub fn new(
        rx: mpsc::Receiver<DomainEvent>,
        provisioning: Arc<ProvisioningWorker>,
        extension: Arc<ExtensionWorker>,
    ) -> Self {
        Self {
            rx,
            provisioning,
            extension,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the dispatch loop.
    pub async fn run(mut self) {
        info!("Event dispatcher started");
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Event dispatcher received shutdown signal");
                    break;
                }

                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        error!("Dispatch task panicked: {}", e);
                    }
                }

                event = self.rx.recv() => match event {
                    Some(event) => self.dispatch(event, &mut tasks),
                    None => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }
        }

        self.rx.close();
        while let Some(event) = self.rx.recv().await {
            self.dispatch(event, &mut tasks);
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Dispatch task panicked: {}", e);
            }
        }

        info!("Event dispatcher stopped");
    }

    fn dispatch(&self, event: DomainEvent, tasks: &mut JoinSet<()>) {
        match event {
            DomainEvent::InferenceRequested {
                index,
                base_image,
                hardware,
            } => {
                let worker = self.provisioning.clone();
                tasks.spawn(async move {
                    if let Err(e) = worker.handle(&index, &base_image, &hardware).await {
                        error!(
                            instance = %index,
                            error = %e,
                            "Failed to record provisioning outcome"
                        );
                    }
                });
            }
            DomainEvent::ExtendSurvivalRequested { index, expiry } => {
                let worker = self.extension.clone();
                tasks.spawn(async move {
                    if let Err(e) = worker.handle(&index, expiry).await {
                        warn!(instance = %index, error = %e, "Failed to extend lease");
                    }
                });
            }
            other => match other.to_payload() {
                Ok(payload) => info!(
                    event_type = other.event_type(),
                    payload = %String::from_utf8_lossy(&payload),
                    "Domain event"
                ),
                Err(e) => warn!(
                    event_type = other.event_type(),
                    error = %e,
                    "Failed to serialize domain event"
                ),
            },
        }
    }
}
