//! Test setup helpers - a ready bridge over a scripted in-memory client
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use mxbridge::client::{
    ClientEvent, ClientRoom, Direction, InMemoryProtocolClient, Membership, MessagePage,
    TimelineItem,
};
use mxbridge::{Bridge, Notification};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

static TRACING: Once = Once::new();

/// Installs the env-filter subscriber once, so failing tests can be rerun
/// with RUST_LOG for detail.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "mxbridge=debug".into()),
            )
            .try_init();
    });
}

pub struct TestSetup {
    pub client: Arc<InMemoryProtocolClient>,
    pub bridge: Bridge,
}

pub struct TestSetupBuilder {
    rooms: Vec<ClientRoom>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self { rooms: vec![] }
    }

    /// Adds a joined room the client knows about.
    pub fn with_room(mut self, room_id: &str) -> Self {
        self.rooms.push(joined_room(room_id));
        self
    }

    /// Builds the bridge and drives the session to `Ready`.
    pub async fn build(self) -> TestSetup {
        init_tracing();
        let client = Arc::new(InMemoryProtocolClient::with_rooms(self.rooms));
        let bridge = Bridge::new(client.clone());
        bridge
            .set_credentials(
                "syt_test_token",
                "TESTDEV",
                "@alice:example.org",
                "https://example.org",
                None,
            )
            .await;
        bridge.start_session().await.expect("session should start");
        TestSetup { client, bridge }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn joined_room(room_id: &str) -> ClientRoom {
    ClientRoom {
        room_id: room_id.to_string(),
        name: Some("general".to_string()),
        notification_count: Some(0),
        highlight_count: Some(0),
        is_direct: Some(false),
        last_message: None,
        own_membership: Membership::Join,
    }
}

pub fn forward_message(room_id: &str, event_id: &str) -> TimelineItem {
    TimelineItem {
        direction: Direction::Forwards,
        event: message_event(room_id, event_id),
    }
}

pub fn backward_message(room_id: &str, event_id: &str) -> TimelineItem {
    TimelineItem {
        direction: Direction::Backwards,
        event: message_event(room_id, event_id),
    }
}

fn message_event(room_id: &str, event_id: &str) -> ClientEvent {
    ClientEvent {
        event_type: Some("m.room.message".to_string()),
        event_id: Some(event_id.to_string()),
        room_id: Some(room_id.to_string()),
        sender: Some("@bob:example.org".to_string()),
        age: Some(42),
        content: Some(serde_json::json!({"msgtype": "m.text", "body": "hi"})),
        origin_server_ts: Some(1_700_000_000_000),
    }
}

/// A history page of message events ending at `end`.
pub fn page(event_ids: &[&str], end: Option<&str>) -> MessagePage {
    MessagePage {
        start: None,
        end: end.map(|token| token.to_string()),
        chunk: event_ids
            .iter()
            .map(|event_id| message_event("!r1:example.org", event_id))
            .collect(),
    }
}

// ============================================================================
// Notification helpers
// ============================================================================

/// Receives the next notification or panics after a short timeout.
pub async fn recv_or_timeout(receiver: &mut broadcast::Receiver<Notification>) -> Notification {
    timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification channel closed")
}

/// Asserts that no further notification arrives within the grace window.
pub async fn settle(receiver: &mut broadcast::Receiver<Notification>) {
    let result = timeout(Duration::from_millis(100), receiver.recv()).await;
    assert!(result.is_err(), "unexpected notification: {:?}", result);
}
