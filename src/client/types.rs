use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

/// Credentials minted by the home server at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub user_id: String,
    pub home_server: String,
    pub access_token: String,
    pub device_id: String,
    pub refresh_token: Option<String>,
}

/// Attributes of the authenticated user once the sync loop is running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAttributes {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub last_active: Option<i64>,
    pub status: Option<String>,
}

/// Delivery direction of an event relative to the subscription start:
/// `Backwards` is historical catch-up, `Forwards` is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Backwards,
    Forwards,
}

/// Room membership as known to the protocol client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Join,
    Invite,
    Leave,
    Ban,
    Kick,
    Unknown,
}

/// One member of a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMember {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub membership: Membership,
}

/// One event as delivered by the protocol client.
///
/// Every field may be missing; the projection layer guarantees a total
/// mapping regardless.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientEvent {
    pub event_type: Option<String>,
    pub event_id: Option<String>,
    pub room_id: Option<String>,
    pub sender: Option<String>,
    pub age: Option<i64>,
    pub content: Option<Value>,
    pub origin_server_ts: Option<i64>,
}

/// A room as known to the protocol client's local state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRoom {
    pub room_id: String,
    pub name: Option<String>,
    pub notification_count: Option<u64>,
    pub highlight_count: Option<u64>,
    pub is_direct: Option<bool>,
    pub last_message: Option<ClientEvent>,
    /// The authenticated user's own membership in this room.
    pub own_membership: Membership,
}

/// Direction-tagged item pushed through an event subscription.
#[derive(Debug, Clone)]
pub struct TimelineItem {
    pub direction: Direction,
    pub event: ClientEvent,
}

/// One page of room history plus its continuation tokens.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub start: Option<String>,
    pub end: Option<String>,
    pub chunk: Vec<ClientEvent>,
}

/// One search result with surrounding context.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub event: ClientEvent,
    pub before: Vec<ClientEvent>,
    pub after: Vec<ClientEvent>,
    pub context_start: Option<String>,
    pub context_end: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub count: Option<u64>,
    pub next_batch: Option<String>,
    pub hits: Vec<SearchHit>,
}

/// Entry in the public room directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicRoomEntry {
    pub id: String,
    pub aliases: Vec<String>,
    pub name: Option<String>,
    #[serde(rename = "guestCanJoin")]
    pub guest_can_join: bool,
    #[serde(rename = "numJoinedMembers")]
    pub num_joined_members: u64,
}

/// Parameters for creating a room. Visibility is always private; a trusted
/// private chat gives invitees the creator's power level.
#[derive(Debug, Clone, Default)]
pub struct CreateRoomRequest {
    pub invitees: Vec<String>,
    pub is_direct: bool,
    pub is_trusted_private_chat: bool,
    pub name: Option<String>,
}

/// Parameters for registering a push notification service.
#[derive(Debug, Clone)]
pub struct PusherRequest {
    pub app_display_name: String,
    pub app_id: String,
    pub push_service_url: String,
    pub token: String,
    pub profile_tag: String,
    pub lang: String,
}

/// Well-known message kinds for room messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    File,
    Audio,
    Emote,
    Location,
}

impl MessageKind {
    /// Unknown kind strings fall back to text.
    pub fn parse(kind: &str) -> Self {
        kind.parse().unwrap_or(MessageKind::Text)
    }
}
