use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::notification::{Notification, NotificationBus};
use super::types::{EventType, EventTypeRegistry};
use crate::client::{Direction, EventSubscription, ProtocolClient};
use crate::projection::project_event;
use crate::shared::BridgeError;

struct ListenerEntry {
    subscription_id: Uuid,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct RegistryState {
    rooms: HashMap<String, ListenerEntry>,
    global: Option<ListenerEntry>,
}

/// Owns every room subscription plus the single global subscription and
/// routes their events to the notification bus.
///
/// All mutations go through one lock held across the protocol calls that
/// commit them, so two concurrent `listen_to_room` calls for the same room
/// cannot both pass the existence check.
pub struct ListenerRegistry {
    client: Arc<dyn ProtocolClient>,
    bus: NotificationBus,
    event_types: Arc<EventTypeRegistry>,
    state: Mutex<RegistryState>,
}

impl ListenerRegistry {
    pub fn new(
        client: Arc<dyn ProtocolClient>,
        bus: NotificationBus,
        event_types: Arc<EventTypeRegistry>,
    ) -> Self {
        Self {
            client,
            bus,
            event_types,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Subscribes to one room's live timeline.
    ///
    /// At most one subscription per room id; a second call fails with
    /// `AlreadyListening` until `unlisten_to_room` removes the first.
    /// Leaving the room does not clean the subscription up; the caller must
    /// still unlisten.
    pub async fn listen_to_room(&self, room_id: &str) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;

        if state.rooms.contains_key(room_id) {
            warn!(room_id = %room_id, "room already has a listener");
            return Err(BridgeError::AlreadyListening(room_id.to_string()));
        }
        if self.client.room(room_id).await.is_none() {
            return Err(BridgeError::RoomNotFound(room_id.to_string()));
        }

        let subscription = self.client.subscribe_room(room_id).await?;
        let entry = ListenerEntry {
            subscription_id: subscription.id,
            task: spawn_room_routing(room_id.to_string(), subscription, self.bus.clone()),
        };
        state.rooms.insert(room_id.to_string(), entry);

        info!(room_id = %room_id, "room listener started");
        Ok(())
    }

    /// Cancels a room subscription. Fails with `NoListener` when none
    /// exists; a second unlisten always fails rather than silently
    /// succeeding.
    ///
    /// No further notifications are delivered after this returns, apart
    /// from at most one delivery already in flight through the routing
    /// task.
    pub async fn unlisten_to_room(&self, room_id: &str) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;

        let entry = state
            .rooms
            .remove(room_id)
            .ok_or_else(|| BridgeError::NoListener(room_id.to_string()))?;

        entry.task.abort();
        self.client.unsubscribe(entry.subscription_id).await;

        info!(room_id = %room_id, "room listener stopped");
        Ok(())
    }

    /// Subscribes to the session-wide event stream.
    ///
    /// Only forward-direction events are re-emitted; historical replay
    /// during catch-up is suppressed so the host is not flooded on
    /// startup. Each event is emitted under its own type's channel, and
    /// only for types the event type registry recognizes.
    pub async fn listen(&self) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;

        if state.global.is_some() {
            warn!("global listener already active");
            return Err(BridgeError::AlreadyListening(
                "only one global listener is supported; call unlisten first".to_string(),
            ));
        }

        let subscription = self.client.subscribe_session().await?;
        state.global = Some(ListenerEntry {
            subscription_id: subscription.id,
            task: spawn_global_routing(subscription, self.bus.clone(), self.event_types.clone()),
        });

        info!("global listener started");
        Ok(())
    }

    /// Cancels the global subscription. Unlike the per-room variant this is
    /// forgiving: with nothing to stop it is a no-op.
    pub async fn unlisten(&self) {
        let mut state = self.state.lock().await;

        if let Some(entry) = state.global.take() {
            entry.task.abort();
            self.client.unsubscribe(entry.subscription_id).await;
            info!("global listener stopped");
        } else {
            debug!("unlisten with no active global listener");
        }
    }

    pub async fn is_listening_to(&self, room_id: &str) -> bool {
        self.state.lock().await.rooms.contains_key(room_id)
    }

    pub async fn has_global_listener(&self) -> bool {
        self.state.lock().await.global.is_some()
    }
}

/// Routes one room's timeline items to the direction-specific channels.
fn spawn_room_routing(
    room_id: String,
    subscription: EventSubscription,
    bus: NotificationBus,
) -> JoinHandle<()> {
    let mut items = subscription.items;
    tokio::spawn(async move {
        while let Some(item) = items.recv().await {
            let event = project_event(&item.event);
            let notification = match item.direction {
                Direction::Backwards => Notification::RoomBackwards(event),
                Direction::Forwards => Notification::RoomForwards(event),
            };
            bus.emit(notification);
        }
        debug!(room_id = %room_id, "room event stream ended");
    })
}

/// Routes session-wide items: forward events only, recognized types only.
fn spawn_global_routing(
    subscription: EventSubscription,
    bus: NotificationBus,
    event_types: Arc<EventTypeRegistry>,
) -> JoinHandle<()> {
    let mut items = subscription.items;
    tokio::spawn(async move {
        while let Some(item) = items.recv().await {
            if item.direction != Direction::Forwards {
                continue;
            }
            let event_type = EventType::of(item.event.event_type.as_deref().unwrap_or(""));
            if !event_types.is_supported(&event_type).await {
                debug!(event_type = %event_type, "dropping unrecognized event type");
                continue;
            }
            bus.emit(Notification::Typed {
                event_type,
                event: project_event(&item.event),
            });
        }
        debug!("session event stream ended");
    })
}
