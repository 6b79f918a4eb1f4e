// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock compute manager for testing.
//!
//! Launches nothing; it records what it was asked to do and answers with a
//! fixed survival time.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::FaultSwitch;
use crate::collaborators::{ComputeManager, LaunchedInference};
use crate::error::{Error, Result};
use crate::inference::InferenceIndex;

/// Mock compute manager.
#[derive(Debug)]
pub struct MockComputeManager {
    survival_time: Duration,
    launched: Mutex<Vec<InferenceIndex>>,
    extensions: Mutex<Vec<(InferenceIndex, DateTime<Utc>)>>,
    /// Fault switch for `launch`.
    pub launch_fault: FaultSwitch,
    /// Fault switch for `extend_survival_time`.
    pub extend_fault: FaultSwitch,
}

impl Default for MockComputeManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl MockComputeManager {
    /// Create a mock granting `survival_time` per launch and extension.
    pub fn new(survival_time: Duration) -> Self {
        Self {
            survival_time,
            launched: Mutex::new(Vec::new()),
            extensions: Mutex::new(Vec::new()),
            launch_fault: FaultSwitch::default(),
            extend_fault: FaultSwitch::default(),
        }
    }

    /// Instances launched so far.
    pub async fn launched(&self) -> Vec<InferenceIndex> {
        self.launched.lock().await.clone()
    }

    /// Extensions applied so far.
    pub async fn extensions(&self) -> Vec<(InferenceIndex, DateTime<Utc>)> {
        self.extensions.lock().await.clone()
    }
}

#[async_trait]
impl ComputeManager for MockComputeManager {
    async fn launch(
        &self,
        index: &InferenceIndex,
        _base_image: &str,
        _hardware: &str,
    ) -> Result<LaunchedInference> {
        if self.launch_fault.trip() {
            return Err(Error::Compute("Mock launch failure".to_string()));
        }
        self.launched.lock().await.push(index.clone());
        Ok(LaunchedInference {
            access_url: format!("http://inference.local/{}", index.id),
            survival_time: self.survival_time,
        })
    }

    async fn survival_time(&self, _index: &InferenceIndex) -> Result<Duration> {
        Ok(self.survival_time)
    }

    async fn extend_survival_time(
        &self,
        index: &InferenceIndex,
        expiry: DateTime<Utc>,
    ) -> Result<()> {
        if self.extend_fault.trip() {
            return Err(Error::Compute("Mock extension failure".to_string()));
        }
        self.extensions.lock().await.push((index.clone(), expiry));
        Ok(())
    }
}
