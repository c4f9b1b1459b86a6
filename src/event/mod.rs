// Event routing infrastructure
//
// This module routes protocol-level events to host-visible notifications
// while enforcing the single-subscriber-per-scope invariants.

// Public API - what other modules can use
pub use notification::{Notification, NotificationBus};
pub use registry::ListenerRegistry;
pub use types::{EventType, EventTypeRegistry, ROOM_BACKWARDS_CHANNEL, ROOM_FORWARDS_CHANNEL};

// Internal modules
mod notification;
mod registry;
mod types;
