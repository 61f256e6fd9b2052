//! Change notifications fanned out to every connected session.
//!
//! An event says only which entity type changed and how. Receivers treat it
//! as a signal to refetch, never as a diff.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Products,
    StockMovements,
    Transactions,
    PettyCash,
    Services,
    PermissionRequests,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::StockMovements => "stock-movements",
            Self::Transactions => "transactions",
            Self::PettyCash => "petty-cash",
            Self::Services => "services",
            Self::PermissionRequests => "permission-requests",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
    Adjust,
}

impl ChangeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Adjust => "adjust",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub action: ChangeAction,
}

impl ChangeEvent {
    pub fn new(entity: EntityKind, action: ChangeAction) -> Self {
        Self { entity, action }
    }
}

/// Fire-and-forget publisher. Cloning shares the same channel.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to whoever is listening. Having no listeners is fine.
    pub fn publish(&self, event: ChangeEvent) {
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(
                entity = event.entity.as_str(),
                action = event.action.as_str(),
                receivers,
                "change published"
            ),
            Err(_) => tracing::debug!(
                entity = event.entity.as_str(),
                action = event.action.as_str(),
                "change published with no subscribers"
            ),
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// A receiver for one session. A slow receiver gets `Lagged` and must
    /// refetch everything.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::RecvError;

    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let broadcaster = Broadcaster::new(4);
        broadcaster.publish(ChangeEvent::new(EntityKind::Products, ChangeAction::Adjust));
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_event() {
        let broadcaster = Broadcaster::new(4);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();
        let event = ChangeEvent::new(EntityKind::Transactions, ChangeAction::Create);

        broadcaster.publish(event);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag() {
        let broadcaster = Broadcaster::new(2);
        let mut receiver = broadcaster.subscribe();
        for _ in 0..5 {
            broadcaster.publish(ChangeEvent::new(EntityKind::Products, ChangeAction::Update));
        }
        assert!(matches!(receiver.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn event_wire_form() {
        let event = ChangeEvent::new(EntityKind::PermissionRequests, ChangeAction::Create);
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"entity":"permission-requests","action":"create"}"#
        );
    }
}
