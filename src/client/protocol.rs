use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::{
    ClientEvent, ClientMember, ClientRoom, CreateRoomRequest, Credentials, Direction, MessageKind,
    MessagePage, PublicRoomEntry, PusherRequest, SearchPage, TimelineItem, UserAttributes,
};

/// Failures originating inside the protocol client.
///
/// The bridge never retries these; it wraps them in
/// [`crate::shared::BridgeError::Protocol`] and hands them to the host.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("local store failure: {0}")]
    Store(String),

    #[error("server rejected request: {0}")]
    Rejected(String),

    #[error("timeline unavailable: {0}")]
    Timeline(String),

    #[error("media transfer failed: {0}")]
    Media(String),
}

/// Cancellable handle for a stream of timeline items.
///
/// The receiver half is consumed by whoever routes the events; the id lets
/// the owner release the client-side resources with
/// [`ProtocolClient::unsubscribe`].
#[derive(Debug)]
pub struct EventSubscription {
    pub id: Uuid,
    pub items: mpsc::UnboundedReceiver<TimelineItem>,
}

/// The external collaborator implementing the chat protocol.
///
/// Implementations own all network I/O, authentication, encryption, local
/// caching and retry behavior. The bridge assumes calls complete out of
/// line and in any order relative to each other.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    // --- authentication and sync ---

    /// Authenticate against the home server and mint fresh credentials.
    async fn authenticate(
        &self,
        home_server: &str,
        username: &str,
        password: &str,
    ) -> Result<Credentials, ClientError>;

    /// Open the local store and run the sync loop to its first success.
    async fn start_sync(&self, credentials: &Credentials) -> Result<UserAttributes, ClientError>;

    // --- room lookup and lifecycle ---

    /// Look up a room in local state. `None` means the room is unknown.
    async fn room(&self, room_id: &str) -> Option<ClientRoom>;

    async fn room_members(&self, room_id: &str) -> Result<Vec<ClientMember>, ClientError>;

    async fn create_room(&self, request: CreateRoomRequest) -> Result<ClientRoom, ClientError>;

    async fn set_room_name(&self, room_id: &str, name: &str) -> Result<(), ClientError>;

    async fn join_room(&self, room_id: &str) -> Result<ClientRoom, ClientError>;

    async fn leave_room(&self, room_id: &str) -> Result<(), ClientError>;

    async fn invite_user(&self, room_id: &str, user_id: &str) -> Result<(), ClientError>;

    async fn kick_user(&self, room_id: &str, user_id: &str, reason: &str)
        -> Result<(), ClientError>;

    async fn set_power_level(
        &self,
        room_id: &str,
        user_id: &str,
        power: i64,
    ) -> Result<(), ClientError>;

    async fn joined_rooms(&self) -> Result<Vec<ClientRoom>, ClientError>;

    async fn invited_rooms(&self) -> Result<Vec<ClientRoom>, ClientError>;

    async fn left_rooms(&self) -> Result<Vec<ClientRoom>, ClientError>;

    async fn public_rooms(&self, server_url: &str) -> Result<Vec<PublicRoomEntry>, ClientError>;

    async fn unread_event_types(&self) -> Result<Vec<String>, ClientError>;

    /// Most recent event of every room the client knows.
    async fn last_events(&self) -> Result<Vec<ClientEvent>, ClientError>;

    // --- event subscriptions ---

    /// Subscribe to one room's live timeline. Items arrive tagged with their
    /// delivery direction.
    async fn subscribe_room(&self, room_id: &str) -> Result<EventSubscription, ClientError>;

    /// Subscribe to the session-wide event stream across all rooms.
    async fn subscribe_session(&self) -> Result<EventSubscription, ClientError>;

    /// Release a subscription. Unknown ids are ignored.
    async fn unsubscribe(&self, subscription_id: Uuid);

    // --- history ---

    /// Fetch a page of room history. An empty `from` token starts from live.
    async fn messages(
        &self,
        room_id: &str,
        from: &str,
        direction: Direction,
        limit: u32,
    ) -> Result<MessagePage, ClientError>;

    /// Advance the room's live timeline backwards. `reset` starts the
    /// timeline's own pagination state over from live.
    async fn paginate_back(&self, room_id: &str, count: u32, reset: bool)
        -> Result<(), ClientError>;

    async fn can_paginate_back(&self, room_id: &str) -> Result<bool, ClientError>;

    async fn search(
        &self,
        room_id: &str,
        term: &str,
        next_batch: Option<&str>,
        before_limit: u32,
        after_limit: u32,
    ) -> Result<SearchPage, ClientError>;

    // --- messaging ---

    /// Send a room message; resolves with the new event id.
    async fn send_message(
        &self,
        room_id: &str,
        kind: MessageKind,
        content: Value,
    ) -> Result<String, ClientError>;

    /// Send an arbitrary event; resolves with the new event id.
    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: Value,
        txn_id: &str,
    ) -> Result<String, ClientError>;

    async fn send_read_receipt(&self, room_id: &str, event_id: &str) -> Result<(), ClientError>;

    async fn mark_room_read(&self, room_id: &str) -> Result<(), ClientError>;

    // --- account, media, presence ---

    async fn set_pusher(&self, request: PusherRequest) -> Result<(), ClientError>;

    async fn set_display_name(&self, display_name: &str) -> Result<(), ClientError>;

    /// Upload a local file to the content repository; resolves with the
    /// keyed content uri.
    async fn upload(
        &self,
        file_uri: &str,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, ClientError>;

    /// Download content to a local folder; resolves with the local file uri.
    async fn download(
        &self,
        content_uri: &str,
        mime_type: &str,
        folder: &str,
    ) -> Result<String, ClientError>;

    /// Resolve a content uri to a downloadable server url, if possible.
    async fn content_url(&self, content_uri: &str) -> Option<String>;

    async fn set_typing(
        &self,
        room_id: &str,
        is_typing: bool,
        timeout: Duration,
    ) -> Result<(), ClientError>;

    async fn set_presence(&self, is_online: bool) -> Result<(), ClientError>;
}
