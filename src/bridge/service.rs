use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::client::{
    ClientError, ClientRoom, CreateRoomRequest, Credentials, Direction, MessageKind,
    ProtocolClient, PublicRoomEntry, PusherRequest, UserAttributes,
};
use crate::event::{EventTypeRegistry, ListenerRegistry, Notification, NotificationBus};
use crate::pagination::CursorStore;
use crate::projection::{
    project_event, project_room, project_search, ProjectedEvent, ProjectedMember, ProjectedRoom,
    ProjectedSearchPage,
};
use crate::session::SessionHandle;
use crate::shared::BridgeError;

const NOTIFICATION_CAPACITY: usize = 256;

/// Acknowledgement of a sent event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendAck {
    pub event_id: String,
}

/// Result of a content upload, keyed by the caller's upload id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub upload_id: String,
    pub content_uri: String,
}

/// The bridge context: one authenticated session, its listener registry,
/// pagination cursors and notification bus. Hosts construct one per
/// process and call the async operations below; live updates arrive
/// through [`Bridge::subscribe`].
pub struct Bridge {
    client: Arc<dyn ProtocolClient>,
    session: SessionHandle,
    registry: ListenerRegistry,
    cursors: CursorStore,
    bus: NotificationBus,
    event_types: Arc<EventTypeRegistry>,
}

impl Bridge {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        let bus = NotificationBus::new(NOTIFICATION_CAPACITY);
        let event_types = Arc::new(EventTypeRegistry::new());
        Self {
            session: SessionHandle::new(client.clone()),
            registry: ListenerRegistry::new(client.clone(), bus.clone(), event_types.clone()),
            cursors: CursorStore::new(),
            bus,
            event_types,
            client,
        }
    }

    /// Receiver for all push notifications this bridge emits.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.bus.subscribe()
    }

    /// Connection-state queries for the host.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    async fn require_room(&self, room_id: &str) -> Result<ClientRoom, BridgeError> {
        self.client
            .room(room_id)
            .await
            .ok_or_else(|| BridgeError::RoomNotFound(room_id.to_string()))
    }

    // --- session ---

    pub async fn configure(&self, home_server: &str) {
        self.session.configure(home_server).await;
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials, BridgeError> {
        self.session.login(username, password).await
    }

    pub async fn set_credentials(
        &self,
        access_token: &str,
        device_id: &str,
        user_id: &str,
        home_server: &str,
        refresh_token: Option<String>,
    ) {
        self.session
            .set_credentials(access_token, device_id, user_id, home_server, refresh_token)
            .await;
    }

    pub async fn start_session(&self) -> Result<UserAttributes, BridgeError> {
        self.session.start_session().await
    }

    /// Registers custom event types the global listener should re-emit in
    /// addition to the base set.
    pub async fn set_additional_event_types(&self, types: Vec<String>) {
        self.event_types.set_additional_types(types).await;
    }

    // --- room lifecycle ---

    #[instrument(skip(self, invitee_ids))]
    pub async fn create_room(
        &self,
        invitee_ids: Vec<String>,
        is_direct: bool,
        is_trusted_private_chat: bool,
        name: Option<String>,
    ) -> Result<ProjectedRoom, BridgeError> {
        self.session.ensure_ready().await?;

        let room = self
            .client
            .create_room(CreateRoomRequest {
                invitees: invitee_ids.clone(),
                is_direct,
                is_trusted_private_chat,
                name,
            })
            .await?;
        info!(room_id = %room.room_id, invitees = invitee_ids.len(), "room created");

        // The server has not returned a member list yet; synthesize entries
        // for the pending invitees.
        let mut projected = project_room(&room, None);
        projected.members = invitee_ids
            .into_iter()
            .map(|user_id| ProjectedMember {
                user_id,
                name: None,
                avatar_url: None,
                membership: "join".to_string(),
            })
            .collect();
        Ok(projected)
    }

    pub async fn update_room_name(&self, room_id: &str, new_name: &str) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        self.client.set_room_name(room_id, new_name).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn join_room(&self, room_id: &str) -> Result<ProjectedRoom, BridgeError> {
        self.session.ensure_ready().await?;

        let room = self.client.join_room(room_id).await?;
        let members = match self.client.room_members(room_id).await {
            Ok(members) => members,
            Err(error) => {
                warn!(
                    room_id = %room_id,
                    error = %error,
                    "could not retrieve member list after joining; the join itself succeeded"
                );
                return Err(BridgeError::Protocol(error));
            }
        };
        Ok(project_room(&room, Some(&members)))
    }

    pub async fn leave_room(&self, room_id: &str) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        self.client.leave_room(room_id).await?;
        Ok(())
    }

    pub async fn invite_user_to_room(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        self.client.invite_user(room_id, user_id).await?;
        Ok(())
    }

    pub async fn remove_user_from_room(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        self.client.kick_user(room_id, user_id, "").await?;
        Ok(())
    }

    pub async fn change_user_permission(
        &self,
        room_id: &str,
        user_id: &str,
        set_admin: bool,
    ) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        let power = if set_admin { 100 } else { 0 };
        self.client.set_power_level(room_id, user_id, power).await?;
        Ok(())
    }

    pub async fn get_invited_rooms(&self) -> Result<Vec<ProjectedRoom>, BridgeError> {
        self.session.ensure_ready().await?;
        let rooms = self.client.invited_rooms().await?;
        Ok(rooms.iter().map(|room| project_room(room, None)).collect())
    }

    pub async fn get_joined_rooms(&self) -> Result<Vec<ProjectedRoom>, BridgeError> {
        self.session.ensure_ready().await?;
        let rooms = self.client.joined_rooms().await?;
        Ok(self.project_rooms_with_members(rooms).await)
    }

    pub async fn get_left_rooms(&self) -> Result<Vec<ProjectedRoom>, BridgeError> {
        self.session.ensure_ready().await?;
        let rooms = self.client.left_rooms().await?;
        Ok(self.project_rooms_with_members(rooms).await)
    }

    /// Fetches member lists for all rooms concurrently; rooms whose member
    /// list cannot be retrieved are skipped.
    async fn project_rooms_with_members(&self, rooms: Vec<ClientRoom>) -> Vec<ProjectedRoom> {
        let member_lists = join_all(
            rooms
                .iter()
                .map(|room| self.client.room_members(&room.room_id)),
        )
        .await;

        rooms
            .iter()
            .zip(member_lists)
            .filter_map(|(room, members)| match members {
                Ok(members) => Some(project_room(room, Some(&members))),
                Err(error) => {
                    warn!(
                        room_id = %room.room_id,
                        error = %error,
                        "cannot retrieve member list for room; dropping it from the result"
                    );
                    None
                }
            })
            .collect()
    }

    pub async fn get_public_rooms(
        &self,
        server_url: &str,
    ) -> Result<Vec<PublicRoomEntry>, BridgeError> {
        self.session.ensure_ready().await?;
        Ok(self.client.public_rooms(server_url).await?)
    }

    pub async fn get_unread_event_types(&self) -> Result<Vec<String>, BridgeError> {
        self.session.ensure_ready().await?;
        Ok(self.client.unread_event_types().await?)
    }

    pub async fn get_last_events_for_all_rooms(&self) -> Result<Vec<ProjectedEvent>, BridgeError> {
        self.session.ensure_ready().await?;
        let events = self.client.last_events().await?;
        Ok(events.iter().map(project_event).collect())
    }

    // --- listening ---

    pub async fn listen_to_room(&self, room_id: &str) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.registry.listen_to_room(room_id).await
    }

    pub async fn unlisten_to_room(&self, room_id: &str) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.registry.unlisten_to_room(room_id).await
    }

    pub async fn listen(&self) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.registry.listen().await
    }

    /// Stops the global listener. Always safe to call, even with no active
    /// listener and before the session is ready.
    pub async fn unlisten(&self) {
        self.registry.unlisten().await;
    }

    // --- history ---

    /// Advances the room's live timeline backwards. This is an independent
    /// pagination track from [`Bridge::load_messages_in_room`]; the two do
    /// not share position.
    pub async fn back_paginate(
        &self,
        room_id: &str,
        per_page: u32,
        init_history: bool,
    ) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        self.client
            .paginate_back(room_id, per_page, init_history)
            .await?;
        Ok(())
    }

    /// Advisory only; reports the live timeline's state, not the cursor
    /// store's.
    pub async fn can_back_paginate(&self, room_id: &str) -> Result<bool, BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        Ok(self.client.can_paginate_back(room_id).await?)
    }

    /// Fetches room history from the server, resuming from the stored
    /// cursor unless `initial_load` restarts from live.
    pub async fn load_messages_in_room(
        &self,
        room_id: &str,
        per_page: u32,
        initial_load: bool,
    ) -> Result<Vec<ProjectedEvent>, BridgeError> {
        let from = if initial_load {
            String::new()
        } else {
            self.cursors.resume_token(room_id).await
        };
        self.get_messages(room_id, &from, Direction::Backwards, per_page)
            .await
    }

    /// Fetches a page of history from an explicit token and records the
    /// returned continuation token for the next backward page.
    pub async fn get_messages(
        &self,
        room_id: &str,
        from: &str,
        direction: Direction,
        limit: u32,
    ) -> Result<Vec<ProjectedEvent>, BridgeError> {
        self.session.ensure_ready().await?;

        let page = self.client.messages(room_id, from, direction, limit).await?;
        self.cursors.record(room_id, page.end.clone()).await;
        Ok(page.chunk.iter().map(project_event).collect())
    }

    pub async fn search_messages_in_room(
        &self,
        room_id: &str,
        term: &str,
        next_batch: Option<&str>,
        before_limit: u32,
        after_limit: u32,
    ) -> Result<ProjectedSearchPage, BridgeError> {
        self.session.ensure_ready().await?;
        let page = self
            .client
            .search(room_id, term, next_batch, before_limit, after_limit)
            .await?;
        Ok(project_search(&page))
    }

    // --- messaging ---

    pub async fn send_message_to_room(
        &self,
        room_id: &str,
        message_type: &str,
        content: Value,
    ) -> Result<SendAck, BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        let event_id = self
            .client
            .send_message(room_id, MessageKind::parse(message_type), content)
            .await?;
        Ok(SendAck { event_id })
    }

    pub async fn send_event_to_room(
        &self,
        room_id: &str,
        event_type: &str,
        content: Value,
    ) -> Result<SendAck, BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        let txn_id = Uuid::new_v4().to_string();
        let event_id = self
            .client
            .send_event(room_id, event_type, content, &txn_id)
            .await?;
        Ok(SendAck { event_id })
    }

    pub async fn send_read_receipt(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.client.send_read_receipt(room_id, event_id).await?;
        Ok(())
    }

    pub async fn mark_room_as_read(&self, room_id: &str) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        self.client.mark_room_read(room_id).await?;
        Ok(())
    }

    // --- account, media, presence ---

    pub async fn register_push_notifications(
        &self,
        display_name: &str,
        app_id: &str,
        push_service_url: &str,
        token: &str,
    ) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        let credentials = self.session.credentials().await.ok_or_else(|| {
            BridgeError::NotConnected("no credentials for pusher registration".to_string())
        })?;

        self.client
            .set_pusher(PusherRequest {
                app_display_name: display_name.to_string(),
                app_id: app_id.to_string(),
                push_service_url: push_service_url.to_string(),
                token: token.to_string(),
                profile_tag: profile_tag(&credentials.user_id),
                lang: "en".to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn set_user_display_name(&self, display_name: &str) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.client.set_display_name(display_name).await?;
        Ok(())
    }

    pub async fn upload_content(
        &self,
        file_uri: &str,
        file_name: &str,
        mime_type: &str,
        upload_id: &str,
    ) -> Result<UploadResponse, BridgeError> {
        self.session.ensure_ready().await?;
        let content_uri = self.client.upload(file_uri, file_name, mime_type).await?;
        Ok(UploadResponse {
            upload_id: upload_id.to_string(),
            content_uri,
        })
    }

    /// Downloads content to a local folder; resolves with the local file
    /// uri.
    pub async fn download_content(
        &self,
        content_uri: &str,
        mime_type: &str,
        folder: &str,
    ) -> Result<String, BridgeError> {
        self.session.ensure_ready().await?;
        Ok(self.client.download(content_uri, mime_type, folder).await?)
    }

    /// Resolves a content uri to a downloadable server url.
    pub async fn get_downloadable_url(&self, content_uri: &str) -> Result<String, BridgeError> {
        self.session.ensure_ready().await?;
        self.client.content_url(content_uri).await.ok_or_else(|| {
            BridgeError::Protocol(ClientError::Media(format!(
                "no downloadable url for {}",
                content_uri
            )))
        })
    }

    /// The timeout only applies while typing; a "stopped typing" notice
    /// uses a short fixed timeout.
    pub async fn send_typing(
        &self,
        room_id: &str,
        is_typing: bool,
        timeout_ms: u64,
    ) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.require_room(room_id).await?;
        let timeout = if is_typing {
            Duration::from_millis(timeout_ms)
        } else {
            Duration::from_secs(1)
        };
        self.client.set_typing(room_id, is_typing, timeout).await?;
        Ok(())
    }

    pub async fn update_presence(&self, is_online: bool) -> Result<(), BridgeError> {
        self.session.ensure_ready().await?;
        self.client.set_presence(is_online).await?;
        Ok(())
    }
}

/// Pusher profile tag derived from the user id, capped at 32 characters.
fn profile_tag(user_id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    let tag = format!("mobile_{}", hasher.finish());
    if tag.len() > 32 {
        let mut rehasher = DefaultHasher::new();
        tag.hash(&mut rehasher);
        rehasher.finish().to_string()
    } else {
        tag
    }
}
