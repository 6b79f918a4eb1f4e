// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Channel-backed event publisher.
//!
//! Publishing never waits: a full or closed channel is reported as
//! `Error::Publish` and the caller decides whether that matters.

use async_trait::async_trait;
use spacehub_core::collaborators::EventPublisher;
use spacehub_core::{DomainEvent, Error, Result};
use tokio::sync::mpsc;
use tracing::debug;

/// Publisher feeding the [`EventDispatcher`](crate::dispatcher::EventDispatcher).
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<DomainEvent>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DomainEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        let event_type = event.event_type();
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Publish(format!("event channel full, dropped {event_type}"))
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::Publish(format!("event channel closed, dropped {event_type}"))
            }
        })?;
        debug!(event_type, "Event published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> DomainEvent {
        DomainEvent::SpaceCreated {
            owner: "alice".to_string(),
            space_id: "s1".to_string(),
            name: "demo".to_string(),
            repo_id: "r1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_delivers() {
        let (publisher, mut rx) = ChannelPublisher::channel(4);
        publisher.publish(event()).await.unwrap();
        assert_eq!(rx.recv().await, Some(event()));
    }

    #[tokio::test]
    async fn test_full_channel_is_an_error() {
        let (publisher, _rx) = ChannelPublisher::channel(1);
        publisher.publish(event()).await.unwrap();
        let err = publisher.publish(event()).await.unwrap_err();
        assert!(err.to_string().contains("full"));
    }

    #[tokio::test]
    async fn test_closed_channel_is_an_error() {
        let (publisher, rx) = ChannelPublisher::channel(1);
        drop(rx);
        let err = publisher.publish(event()).await.unwrap_err();
        assert_eq!(err.error_code(), "PUBLISH_ERROR");
    }
}
