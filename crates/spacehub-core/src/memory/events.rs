// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory event publisher, activity log and related-resource index.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::FaultSwitch;
use crate::collaborators::{ActivityLog, EventPublisher, RelatedResources};
use crate::error::{Error, Result};
use crate::events::{ActivityRecord, DomainEvent, RelatedResource};
use crate::space::SpaceIndex;

/// Publisher that records every event it accepts.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
    /// Fault switch for `publish`.
    pub fault: FaultSwitch,
}

impl RecordingPublisher {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// All accepted events.
    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    /// Accepted events of one type.
    pub async fn events_of(&self, event_type: &str) -> Vec<DomainEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        if self.fault.trip() {
            return Err(Error::Publish(format!(
                "injected failure publishing {}",
                event.event_type()
            )));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Activity log kept in memory.
#[derive(Debug, Default)]
pub struct MemoryActivityLog {
    records: Mutex<Vec<ActivityRecord>>,
    /// Fault switch for `append`.
    pub fault: FaultSwitch,
}

impl MemoryActivityLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records.
    pub async fn records(&self) -> Vec<ActivityRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn append(&self, record: ActivityRecord) -> Result<()> {
        if self.fault.trip() {
            return Err(Error::Activity("injected append failure".to_string()));
        }
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// Links between Spaces and models/datasets.
#[derive(Debug, Default)]
pub struct MemoryRelatedResources {
    links: Mutex<HashMap<SpaceIndex, Vec<RelatedResource>>>,
}

impl MemoryRelatedResources {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a resource to a Space.
    pub async fn link(&self, space: SpaceIndex, resource: RelatedResource) {
        self.links
            .lock()
            .await
            .entry(space)
            .or_default()
            .push(resource);
    }
}

#[async_trait]
impl RelatedResources for MemoryRelatedResources {
    async fn find(&self, space: &SpaceIndex) -> Result<Vec<RelatedResource>> {
        Ok(self
            .links
            .lock()
            .await
            .get(space)
            .cloned()
            .unwrap_or_default())
    }
}
