use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::protocol::{ClientError, EventSubscription, ProtocolClient};
use super::types::{
    ClientEvent, ClientMember, ClientRoom, CreateRoomRequest, Credentials, Direction, Membership,
    MessageKind, MessagePage, PublicRoomEntry, PusherRequest, SearchPage, TimelineItem,
    UserAttributes,
};

/// Recorded arguments of a history fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMessagesCall {
    pub room_id: String,
    pub from: String,
    pub direction: Direction,
    pub limit: u32,
}

/// Recorded arguments of a live-timeline pagination call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPaginateCall {
    pub room_id: String,
    pub count: u32,
    pub reset: bool,
}

/// Recorded arguments of a sent event.
#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub room_id: String,
    pub event_type: String,
    pub content: Value,
    pub txn_id: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    rooms: HashMap<String, ClientRoom>,
    members: HashMap<String, Vec<ClientMember>>,
    member_failures: HashMap<String, ClientError>,
    public_rooms: Vec<PublicRoomEntry>,
    unread_types: Vec<String>,
    pages: HashMap<String, HashMap<String, MessagePage>>,
    search_pages: HashMap<String, SearchPage>,
    can_paginate: HashMap<String, bool>,
    room_subscriptions: HashMap<Uuid, (String, mpsc::UnboundedSender<TimelineItem>)>,
    session_subscriptions: HashMap<Uuid, mpsc::UnboundedSender<TimelineItem>>,
    messages_calls: Vec<RecordedMessagesCall>,
    paginate_calls: Vec<RecordedPaginateCall>,
    sends: Vec<RecordedSend>,
    receipts: Vec<(String, String)>,
    rooms_marked_read: Vec<String>,
    power_levels: Vec<(String, String, i64)>,
    typing_calls: Vec<(String, bool, Duration)>,
    pushers: Vec<PusherRequest>,
    uploads: Vec<(String, String, String)>,
    display_name: Option<String>,
    presence_online: Option<bool>,
    authenticate_calls: u32,
    fail_auth: Option<ClientError>,
    fail_sync: Option<ClientError>,
    fail_subscribe: Option<ClientError>,
}

/// In-memory implementation of [`ProtocolClient`] for development and testing.
///
/// This provides a realistic implementation without a real home server.
/// Rooms, history pages and search results are scripted up front; tests push
/// timeline items through it and assert on the calls it recorded.
pub struct InMemoryProtocolClient {
    state: Mutex<MemoryState>,
}

impl Default for InMemoryProtocolClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProtocolClient {
    /// Creates a new empty in-memory client.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Creates an in-memory client with pre-populated rooms.
    pub fn with_rooms(rooms: Vec<ClientRoom>) -> Self {
        let client = Self::new();
        {
            let mut state = client.state.lock().unwrap();
            for room in rooms {
                state.rooms.insert(room.room_id.clone(), room);
            }
        }
        client
    }

    pub fn add_room(&self, room: ClientRoom) {
        let mut state = self.state.lock().unwrap();
        state.rooms.insert(room.room_id.clone(), room);
    }

    pub fn set_members(&self, room_id: &str, members: Vec<ClientMember>) {
        let mut state = self.state.lock().unwrap();
        state.members.insert(room_id.to_string(), members);
    }

    /// Makes the next `room_members` call for `room_id` fail.
    pub fn fail_members_for(&self, room_id: &str, error: ClientError) {
        let mut state = self.state.lock().unwrap();
        state.member_failures.insert(room_id.to_string(), error);
    }

    /// Scripts the page returned for a history fetch from `from`.
    pub fn script_page(&self, room_id: &str, from: &str, page: MessagePage) {
        let mut state = self.state.lock().unwrap();
        state
            .pages
            .entry(room_id.to_string())
            .or_default()
            .insert(from.to_string(), page);
    }

    pub fn script_search(&self, room_id: &str, page: SearchPage) {
        let mut state = self.state.lock().unwrap();
        state.search_pages.insert(room_id.to_string(), page);
    }

    pub fn set_can_paginate(&self, room_id: &str, value: bool) {
        let mut state = self.state.lock().unwrap();
        state.can_paginate.insert(room_id.to_string(), value);
    }

    pub fn set_public_rooms(&self, rooms: Vec<PublicRoomEntry>) {
        self.state.lock().unwrap().public_rooms = rooms;
    }

    pub fn set_unread_types(&self, types: Vec<String>) {
        self.state.lock().unwrap().unread_types = types;
    }

    pub fn fail_next_auth(&self, error: ClientError) {
        self.state.lock().unwrap().fail_auth = Some(error);
    }

    pub fn fail_next_sync(&self, error: ClientError) {
        self.state.lock().unwrap().fail_sync = Some(error);
    }

    pub fn fail_next_subscribe(&self, error: ClientError) {
        self.state.lock().unwrap().fail_subscribe = Some(error);
    }

    /// Pushes a timeline item to every live subscription of `room_id`.
    /// Returns how many subscriptions it was delivered to.
    pub fn push_room_item(&self, room_id: &str, item: TimelineItem) -> usize {
        let mut state = self.state.lock().unwrap();
        let mut delivered = 0;
        state.room_subscriptions.retain(|_, entry| {
            if entry.0 != room_id {
                return true;
            }
            match entry.1.send(item.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    /// Pushes a timeline item to every live session-wide subscription.
    pub fn push_session_item(&self, item: TimelineItem) -> usize {
        let mut state = self.state.lock().unwrap();
        let mut delivered = 0;
        state.session_subscriptions.retain(|_, sender| match sender.send(item.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });
        delivered
    }

    pub fn room_subscription_count(&self) -> usize {
        self.state.lock().unwrap().room_subscriptions.len()
    }

    pub fn session_subscription_count(&self) -> usize {
        self.state.lock().unwrap().session_subscriptions.len()
    }

    pub fn recorded_messages_calls(&self) -> Vec<RecordedMessagesCall> {
        self.state.lock().unwrap().messages_calls.clone()
    }

    pub fn recorded_paginate_calls(&self) -> Vec<RecordedPaginateCall> {
        self.state.lock().unwrap().paginate_calls.clone()
    }

    pub fn recorded_sends(&self) -> Vec<RecordedSend> {
        self.state.lock().unwrap().sends.clone()
    }

    pub fn recorded_receipts(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().receipts.clone()
    }

    pub fn rooms_marked_read(&self) -> Vec<String> {
        self.state.lock().unwrap().rooms_marked_read.clone()
    }

    pub fn recorded_power_levels(&self) -> Vec<(String, String, i64)> {
        self.state.lock().unwrap().power_levels.clone()
    }

    pub fn recorded_typing_calls(&self) -> Vec<(String, bool, Duration)> {
        self.state.lock().unwrap().typing_calls.clone()
    }

    pub fn recorded_pushers(&self) -> Vec<PusherRequest> {
        self.state.lock().unwrap().pushers.clone()
    }

    pub fn recorded_uploads(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn display_name(&self) -> Option<String> {
        self.state.lock().unwrap().display_name.clone()
    }

    pub fn presence_online(&self) -> Option<bool> {
        self.state.lock().unwrap().presence_online
    }

    pub fn authenticate_count(&self) -> u32 {
        self.state.lock().unwrap().authenticate_calls
    }
}

fn host_of(home_server: &str) -> &str {
    home_server
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

#[async_trait]
impl ProtocolClient for InMemoryProtocolClient {
    async fn authenticate(
        &self,
        home_server: &str,
        username: &str,
        _password: &str,
    ) -> Result<Credentials, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.authenticate_calls += 1;
        if let Some(error) = state.fail_auth.take() {
            return Err(error);
        }
        Ok(Credentials {
            user_id: format!("@{}:{}", username, host_of(home_server)),
            home_server: home_server.to_string(),
            access_token: format!("syt_{}", Uuid::new_v4().simple()),
            device_id: format!("DEV{}", &Uuid::new_v4().simple().to_string()[..8]),
            refresh_token: None,
        })
    }

    async fn start_sync(&self, credentials: &Credentials) -> Result<UserAttributes, ClientError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_sync.take() {
            return Err(error);
        }
        Ok(UserAttributes {
            user_id: credentials.user_id.clone(),
            display_name: state.display_name.clone(),
            avatar: None,
            last_active: Some(Utc::now().timestamp_millis()),
            status: None,
        })
    }

    async fn room(&self, room_id: &str) -> Option<ClientRoom> {
        self.state.lock().unwrap().rooms.get(room_id).cloned()
    }

    async fn room_members(&self, room_id: &str) -> Result<Vec<ClientMember>, ClientError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.member_failures.remove(room_id) {
            return Err(error);
        }
        Ok(state.members.get(room_id).cloned().unwrap_or_default())
    }

    async fn create_room(&self, request: CreateRoomRequest) -> Result<ClientRoom, ClientError> {
        let room = ClientRoom {
            room_id: format!("!{}:example.org", Uuid::new_v4().simple()),
            name: request.name,
            notification_count: Some(0),
            highlight_count: Some(0),
            is_direct: Some(request.is_direct),
            last_message: None,
            own_membership: Membership::Join,
        };
        let mut state = self.state.lock().unwrap();
        state.rooms.insert(room.room_id.clone(), room.clone());
        Ok(room)
    }

    async fn set_room_name(&self, room_id: &str, name: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        match state.rooms.get_mut(room_id) {
            Some(room) => {
                room.name = Some(name.to_string());
                Ok(())
            }
            None => Err(ClientError::Rejected(format!("unknown room {}", room_id))),
        }
    }

    async fn join_room(&self, room_id: &str) -> Result<ClientRoom, ClientError> {
        let mut state = self.state.lock().unwrap();
        let room = state
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| ClientRoom {
                room_id: room_id.to_string(),
                name: None,
                notification_count: Some(0),
                highlight_count: Some(0),
                is_direct: Some(false),
                last_message: None,
                own_membership: Membership::Join,
            });
        room.own_membership = Membership::Join;
        Ok(room.clone())
    }

    async fn leave_room(&self, room_id: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        match state.rooms.get_mut(room_id) {
            Some(room) => {
                room.own_membership = Membership::Leave;
                Ok(())
            }
            None => Err(ClientError::Rejected(format!("unknown room {}", room_id))),
        }
    }

    async fn invite_user(&self, room_id: &str, user_id: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .members
            .entry(room_id.to_string())
            .or_default()
            .push(ClientMember {
                user_id: user_id.to_string(),
                display_name: None,
                avatar_url: None,
                membership: Membership::Invite,
            });
        Ok(())
    }

    async fn kick_user(
        &self,
        room_id: &str,
        user_id: &str,
        _reason: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        if let Some(members) = state.members.get_mut(room_id) {
            members.retain(|member| member.user_id != user_id);
        }
        Ok(())
    }

    async fn set_power_level(
        &self,
        room_id: &str,
        user_id: &str,
        power: i64,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .power_levels
            .push((room_id.to_string(), user_id.to_string(), power));
        Ok(())
    }

    async fn joined_rooms(&self) -> Result<Vec<ClientRoom>, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rooms
            .values()
            .filter(|room| room.own_membership == Membership::Join)
            .cloned()
            .collect())
    }

    async fn invited_rooms(&self) -> Result<Vec<ClientRoom>, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rooms
            .values()
            .filter(|room| room.own_membership == Membership::Invite)
            .cloned()
            .collect())
    }

    async fn left_rooms(&self) -> Result<Vec<ClientRoom>, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rooms
            .values()
            .filter(|room| room.own_membership == Membership::Leave)
            .cloned()
            .collect())
    }

    async fn public_rooms(&self, _server_url: &str) -> Result<Vec<PublicRoomEntry>, ClientError> {
        Ok(self.state.lock().unwrap().public_rooms.clone())
    }

    async fn unread_event_types(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.state.lock().unwrap().unread_types.clone())
    }

    async fn last_events(&self) -> Result<Vec<ClientEvent>, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rooms
            .values()
            .filter_map(|room| room.last_message.clone())
            .collect())
    }

    async fn subscribe_room(&self, room_id: &str) -> Result<EventSubscription, ClientError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_subscribe.take() {
            return Err(error);
        }
        if !state.rooms.contains_key(room_id) {
            return Err(ClientError::Timeline(format!("unknown room {}", room_id)));
        }
        let (sender, items) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        state
            .room_subscriptions
            .insert(id, (room_id.to_string(), sender));
        debug!(room_id = %room_id, subscription_id = %id, "room subscription opened");
        Ok(EventSubscription { id, items })
    }

    async fn subscribe_session(&self) -> Result<EventSubscription, ClientError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_subscribe.take() {
            return Err(error);
        }
        let (sender, items) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        state.session_subscriptions.insert(id, sender);
        debug!(subscription_id = %id, "session subscription opened");
        Ok(EventSubscription { id, items })
    }

    async fn unsubscribe(&self, subscription_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        state.room_subscriptions.remove(&subscription_id);
        state.session_subscriptions.remove(&subscription_id);
    }

    async fn messages(
        &self,
        room_id: &str,
        from: &str,
        direction: Direction,
        limit: u32,
    ) -> Result<MessagePage, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.messages_calls.push(RecordedMessagesCall {
            room_id: room_id.to_string(),
            from: from.to_string(),
            direction,
            limit,
        });
        Ok(state
            .pages
            .get(room_id)
            .and_then(|by_from| by_from.get(from))
            .cloned()
            .unwrap_or_default())
    }

    async fn paginate_back(
        &self,
        room_id: &str,
        count: u32,
        reset: bool,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.paginate_calls.push(RecordedPaginateCall {
            room_id: room_id.to_string(),
            count,
            reset,
        });
        Ok(())
    }

    async fn can_paginate_back(&self, room_id: &str) -> Result<bool, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state.can_paginate.get(room_id).copied().unwrap_or(true))
    }

    async fn search(
        &self,
        room_id: &str,
        _term: &str,
        _next_batch: Option<&str>,
        _before_limit: u32,
        _after_limit: u32,
    ) -> Result<SearchPage, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state.search_pages.get(room_id).cloned().unwrap_or_default())
    }

    async fn send_message(
        &self,
        room_id: &str,
        kind: MessageKind,
        content: Value,
    ) -> Result<String, ClientError> {
        let event_id = format!("${}", Uuid::new_v4().simple());
        let mut state = self.state.lock().unwrap();
        state.sends.push(RecordedSend {
            room_id: room_id.to_string(),
            event_type: format!("m.room.message:{}", kind),
            content,
            txn_id: None,
        });
        Ok(event_id)
    }

    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: Value,
        txn_id: &str,
    ) -> Result<String, ClientError> {
        let event_id = format!("${}", Uuid::new_v4().simple());
        let mut state = self.state.lock().unwrap();
        state.sends.push(RecordedSend {
            room_id: room_id.to_string(),
            event_type: event_type.to_string(),
            content,
            txn_id: Some(txn_id.to_string()),
        });
        Ok(event_id)
    }

    async fn send_read_receipt(&self, room_id: &str, event_id: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .receipts
            .push((room_id.to_string(), event_id.to_string()));
        Ok(())
    }

    async fn mark_room_read(&self, room_id: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.rooms_marked_read.push(room_id.to_string());
        Ok(())
    }

    async fn set_pusher(&self, request: PusherRequest) -> Result<(), ClientError> {
        self.state.lock().unwrap().pushers.push(request);
        Ok(())
    }

    async fn set_display_name(&self, display_name: &str) -> Result<(), ClientError> {
        self.state.lock().unwrap().display_name = Some(display_name.to_string());
        Ok(())
    }

    async fn upload(
        &self,
        file_uri: &str,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.uploads.push((
            file_uri.to_string(),
            file_name.to_string(),
            mime_type.to_string(),
        ));
        Ok(format!("mxc://example.org/{}", Uuid::new_v4().simple()))
    }

    async fn download(
        &self,
        content_uri: &str,
        _mime_type: &str,
        folder: &str,
    ) -> Result<String, ClientError> {
        let file_name = content_uri.rsplit('/').next().unwrap_or("content");
        Ok(format!("{}/{}", folder.trim_end_matches('/'), file_name))
    }

    async fn content_url(&self, content_uri: &str) -> Option<String> {
        content_uri.strip_prefix("mxc://").map(|rest| {
            format!("https://example.org/_matrix/media/r0/download/{}", rest)
        })
    }

    async fn set_typing(
        &self,
        room_id: &str,
        is_typing: bool,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .typing_calls
            .push((room_id.to_string(), is_typing, timeout));
        Ok(())
    }

    async fn set_presence(&self, is_online: bool) -> Result<(), ClientError> {
        self.state.lock().unwrap().presence_online = Some(is_online);
        Ok(())
    }
}
