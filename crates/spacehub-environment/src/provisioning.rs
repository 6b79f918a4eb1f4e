// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker launching requested inference instances.
//!
//! Consumes `InferenceRequested` events. A successful launch records the
//! access URL and initial expiry on the instance; a failed launch records
//! the error, after which every lease request for the same commit fails
//! with `DeadInference` until the boot file changes.

use std::sync::Arc;

use spacehub_core::InferenceService;
use spacehub_core::collaborators::ComputeManager;
use spacehub_core::inference::InferenceIndex;
use tracing::{info, instrument, warn};

use crate::error::Result;

/// Launches instances and reports the outcome back to the lease manager.
pub struct ProvisioningWorker {
    compute: Arc<dyn ComputeManager>,
    inference: Arc<InferenceService>,
}

impl ProvisioningWorker {
    /// Create a new provisioning worker.
    pub fn new(compute: Arc<dyn ComputeManager>, inference: Arc<InferenceService>) -> Self {
        Self { compute, inference }
    }

    /// Launch one instance.
    ///
    /// Returns an error only when the outcome could not be recorded.
    #[instrument(skip(self, index), fields(instance = %index))]
    pub async fn handle(
        &self,
        index: &InferenceIndex,
        base_image: &str,
        hardware: &str,
    ) -> Result<()> {
        match self.compute.launch(index, base_image, hardware).await {
            Ok(launched) => {
                info!(access_url = %launched.access_url, "Inference instance launched");
                self.inference
                    .record_provisioned(index, &launched.access_url, launched.survival_time)
                    .await?;
            }
            Err(e) => {
                warn!(error = %e, "Inference launch failed");
                self.inference.record_failure(index, &e.to_string()).await?;
            }
        }
        Ok(())
    }
}
