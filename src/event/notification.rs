use tokio::sync::broadcast;
use tracing::debug;

use super::types::{EventType, ROOM_BACKWARDS_CHANNEL, ROOM_FORWARDS_CHANNEL};
use crate::projection::ProjectedEvent;

/// A push notification crossing the bridge boundary.
///
/// Room listeners produce the two direction variants; the global listener
/// produces `Typed`, whose channel name is the event's own type string.
#[derive(Debug, Clone)]
pub enum Notification {
    RoomBackwards(ProjectedEvent),
    RoomForwards(ProjectedEvent),
    Typed {
        event_type: EventType,
        event: ProjectedEvent,
    },
}

impl Notification {
    /// The named channel this notification is emitted under.
    pub fn channel(&self) -> String {
        match self {
            Notification::RoomBackwards(_) => ROOM_BACKWARDS_CHANNEL.to_string(),
            Notification::RoomForwards(_) => ROOM_FORWARDS_CHANNEL.to_string(),
            Notification::Typed { event_type, .. } => event_type.to_string(),
        }
    }

    pub fn event(&self) -> &ProjectedEvent {
        match self {
            Notification::RoomBackwards(event) => event,
            Notification::RoomForwards(event) => event,
            Notification::Typed { event, .. } => event,
        }
    }
}

/// Broadcast channel carrying notifications to the host.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Creates a new bus with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all notifications. Slow receivers may observe lag.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Emits a notification to all subscribers.
    pub fn emit(&self, notification: Notification) {
        let channel = notification.channel();
        match self.sender.send(notification) {
            Ok(receiver_count) => {
                debug!(
                    channel = %channel,
                    receivers = receiver_count,
                    "notification emitted"
                );
            }
            Err(_) => {
                debug!(channel = %channel, "notification emitted with no receivers");
            }
        }
    }
}
