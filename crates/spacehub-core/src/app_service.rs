// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SpaceApp service: loads an app, validates a transition and writes it back
//! with a single compare-and-set.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::app::{AppTransition, SpaceApp, SpaceAppIndex};
use crate::collaborators::SpaceAppStore;
use crate::error::{Error, Result};

/// Applies state machine transitions under optimistic concurrency.
///
/// There is no retry loop here. A caller that gets
/// `Error::StaleOptimisticVersion` calls [`SpaceAppService::apply`] again,
/// which re-reads the app and re-checks the guard against the fresh status.
pub struct SpaceAppService {
    store: Arc<dyn SpaceAppStore>,
}

impl SpaceAppService {
    /// Create a new service.
    pub fn new(store: Arc<dyn SpaceAppStore>) -> Self {
        Self { store }
    }

    /// Register a commit, creating its app in `Init` on first sight.
    pub async fn observe_commit(&self, index: SpaceAppIndex) -> Result<SpaceApp> {
        if let Some(app) = self.store.find(&index).await? {
            return Ok(app);
        }

        match self.store.insert(&SpaceApp::new(index.clone())).await {
            Ok(app) => {
                info!(app = %index, "Space app registered");
                Ok(app)
            }
            Err(e) if e.is_conflict() => {
                debug!(app = %index, "Space app registered concurrently, re-reading");
                self.get(&index).await
            }
            Err(e) => Err(e),
        }
    }

    /// Look up an app.
    pub async fn get(&self, index: &SpaceAppIndex) -> Result<SpaceApp> {
        self.store
            .find(index)
            .await?
            .ok_or_else(|| Error::SpaceAppNotFound(index.to_string()))
    }

    /// Apply `transition` to the stored app.
    pub async fn apply(
        &self,
        index: &SpaceAppIndex,
        transition: AppTransition,
    ) -> Result<SpaceApp> {
        let current = self.get(index).await?;
        let expected_version = current.version;
        let from = current.status;
        let name = transition.name();

        let mut next = current;
        if let Err(e) = next.apply(transition, Utc::now()) {
            warn!(app = %index, transition = name, status = %from, "Rejected space app transition");
            return Err(e);
        }

        let stored = self.store.update(&next, expected_version).await?;
        debug!(
            app = %index,
            transition = name,
            from = %from,
            to = %stored.status,
            version = stored.version,
            "Space app transition applied"
        );
        Ok(stored)
    }
}
