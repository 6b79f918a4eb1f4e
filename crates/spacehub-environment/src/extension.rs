// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker applying lease extensions requested on reuse.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use spacehub_core::InferenceService;
use spacehub_core::inference::InferenceIndex;
use tracing::debug;

use crate::error::Result;

/// Extends the survival time of reused instances.
pub struct ExtensionWorker {
    inference: Arc<InferenceService>,
}

impl ExtensionWorker {
    /// Create a new extension worker.
    pub fn new(inference: Arc<InferenceService>) -> Self {
        Self { inference }
    }

    /// Extend `index`, whose lease was observed to end at `expiry`.
    pub async fn handle(&self, index: &InferenceIndex, expiry: DateTime<Utc>) -> Result<()> {
        debug!(instance = %index, claim = %expiry, "Processing extension request");
        self.inference.extend_survival_time(index, expiry).await?;
        Ok(())
    }
}
