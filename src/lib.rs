// Library crate for the Matrix session bridge
// This file exposes the public API for host applications and integration tests

pub mod bridge;
pub mod client;
pub mod event;
pub mod pagination;
pub mod projection;
pub mod session;
pub mod shared;

// Re-export commonly used types for easier access in hosts and tests
pub use bridge::{Bridge, SendAck, UploadResponse};
pub use client::{
    ClientError, Direction, EventSubscription, InMemoryProtocolClient, Membership, ProtocolClient,
};
pub use event::{EventType, EventTypeRegistry, ListenerRegistry, Notification, NotificationBus};
pub use pagination::CursorStore;
pub use projection::{ProjectedEvent, ProjectedMember, ProjectedRoom, ProjectedSearchPage};
pub use session::{ConnectionState, SessionHandle};
pub use shared::BridgeError;
