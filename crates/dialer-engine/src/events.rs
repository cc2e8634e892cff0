//! Dialer Event System
//!
//! Outbound side-channel built on `tokio::sync::broadcast`. Nothing in the
//! dialing path waits on listeners: publishing with no subscribers is a
//! no-op, and a lagging subscriber loses the oldest events rather than
//! slowing the pacer down.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{DialerError, Result};
use crate::types::{
    ActorId, CallOutcome, CampaignId, CampaignStatus, ContactId, ContactStatus, ListId, QueueEntryId,
};

/// Events published by the dialer engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DialerEvent {
    CampaignCreated {
        campaign_id: CampaignId,
        name: String,
    },
    CampaignUpdated {
        campaign_id: CampaignId,
    },
    /// A lifecycle transition was applied
    CampaignStatusChanged {
        campaign_id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    },
    QueueGenerated {
        campaign_id: CampaignId,
        entries: usize,
    },
    DialStarted {
        campaign_id: CampaignId,
        entry_id: QueueEntryId,
        contact_id: ContactId,
        actor_id: ActorId,
        provider_call_id: Option<String>,
    },
    DialFailed {
        campaign_id: CampaignId,
        entry_id: QueueEntryId,
        contact_id: ContactId,
        reason: String,
    },
    OutcomeRecorded {
        campaign_id: CampaignId,
        entry_id: QueueEntryId,
        contact_id: ContactId,
        outcome: CallOutcome,
        contact_status: ContactStatus,
    },
    LeaseExpired {
        campaign_id: CampaignId,
        entry_id: QueueEntryId,
        contact_id: ContactId,
    },
    ContactsUploaded {
        list_id: ListId,
        accepted: usize,
        rejected: usize,
    },
}

impl DialerEvent {
    /// Campaign the event belongs to, if any
    pub fn campaign_id(&self) -> Option<&CampaignId> {
        match self {
            Self::CampaignCreated { campaign_id, .. }
            | Self::CampaignUpdated { campaign_id }
            | Self::CampaignStatusChanged { campaign_id, .. }
            | Self::QueueGenerated { campaign_id, .. }
            | Self::DialStarted { campaign_id, .. }
            | Self::DialFailed { campaign_id, .. }
            | Self::OutcomeRecorded { campaign_id, .. }
            | Self::LeaseExpired { campaign_id, .. } => Some(campaign_id),
            Self::ContactsUploaded { .. } => None,
        }
    }
}

/// Event with its publication time
#[derive(Debug, Clone)]
pub struct TimestampedEvent {
    pub at: DateTime<Utc>,
    pub event: DialerEvent,
}

/// Broadcast bus shared by every dialer component
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TimestampedEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns the number of subscribers that received it
    pub fn publish(&self, event: DialerEvent) -> usize {
        debug!("📣 Publishing dialer event: {:?}", event);
        self.sender
            .send(TimestampedEvent { at: Utc::now(), event })
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> DialerEventSubscriber {
        DialerEventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Receiving half handed to listeners
pub struct DialerEventSubscriber {
    receiver: broadcast::Receiver<TimestampedEvent>,
}

impl DialerEventSubscriber {
    /// Receive the next event, skipping over any lag gap
    pub async fn receive(&mut self) -> Result<TimestampedEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("⚠️ Dialer event subscriber lagged, {} events dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(DialerError::internal("event bus closed"));
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_receive(&mut self) -> Result<Option<TimestampedEvent>> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(_)) => self.try_receive(),
            Err(e) => Err(DialerError::internal(format!("failed to receive event: {}", e))),
        }
    }
}

/// Listener for dialer events (notifications, audit log, ...)
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: TimestampedEvent);
}

/// Drive `handler` with every event published on `bus` until the bus closes
pub fn spawn_handler(bus: &EventBus, handler: Arc<dyn EventHandler>) -> JoinHandle<()> {
    let mut subscriber = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = subscriber.receive().await {
            handler.handle_event(event).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder(Mutex<Vec<DialerEvent>>);

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle_event(&self, event: TimestampedEvent) {
            self.0.lock().push(event.event);
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new(4);
        let delivered = bus.publish(DialerEvent::CampaignUpdated {
            campaign_id: CampaignId::from("c-1"),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        bus.publish(DialerEvent::QueueGenerated { campaign_id: "c-1".into(), entries: 3 });
        bus.publish(DialerEvent::CampaignUpdated { campaign_id: "c-1".into() });

        let first = sub.receive().await.unwrap();
        assert!(matches!(first.event, DialerEvent::QueueGenerated { entries: 3, .. }));
        let second = sub.try_receive().unwrap().unwrap();
        assert_eq!(second.event.campaign_id().map(|c| c.as_str()), Some("c-1"));
        assert!(sub.try_receive().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spawned_handler_sees_events() {
        let bus = EventBus::new(16);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let handle = spawn_handler(&bus, recorder.clone());

        bus.publish(DialerEvent::CampaignCreated { campaign_id: "c-9".into(), name: "spring".into() });

        for _ in 0..50 {
            if !recorder.0.lock().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(recorder.0.lock().len(), 1);
        handle.abort();
    }
}
