use std::collections::HashSet;

use strum_macros::{Display, EnumString};
use tokio::sync::RwLock;
use tracing::debug;

/// Channel for historical events delivered to a room listener.
pub const ROOM_BACKWARDS_CHANNEL: &str = "room.backwards";
/// Channel for live events delivered to a room listener.
pub const ROOM_FORWARDS_CHANNEL: &str = "room.forwards";

/// Event types the global listener can re-emit.
///
/// The fixed variants are the base set; anything else the protocol client
/// delivers parses into `Custom` and is only re-emitted when the host has
/// registered it as an additional type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, EnumString)]
pub enum EventType {
    #[strum(to_string = "m.fully_read")]
    FullyRead,
    #[strum(to_string = "m.room.name")]
    RoomName,
    #[strum(to_string = "m.room.topic")]
    RoomTopic,
    #[strum(to_string = "m.room.avatar")]
    RoomAvatar,
    #[strum(to_string = "m.room.member")]
    RoomMember,
    #[strum(to_string = "m.room.create")]
    RoomCreate,
    #[strum(to_string = "m.room.join_rules")]
    RoomJoinRules,
    #[strum(to_string = "m.room.power_levels")]
    RoomPowerLevels,
    #[strum(to_string = "m.room.aliases")]
    RoomAliases,
    #[strum(to_string = "m.room.canonical_alias")]
    RoomCanonicalAlias,
    #[strum(to_string = "m.room.encrypted")]
    RoomEncrypted,
    #[strum(to_string = "m.room.encryption")]
    RoomEncryption,
    #[strum(to_string = "m.room.guest_access")]
    RoomGuestAccess,
    #[strum(to_string = "m.room.history_visibility")]
    RoomHistoryVisibility,
    #[strum(to_string = "m.room_key")]
    RoomKey,
    #[strum(to_string = "m.forwarded_room_key")]
    ForwardedRoomKey,
    #[strum(to_string = "m.room_key_request")]
    RoomKeyRequest,
    #[strum(to_string = "m.room.message")]
    RoomMessage,
    #[strum(to_string = "m.room.message.feedback")]
    RoomMessageFeedback,
    #[strum(to_string = "m.room.redaction")]
    RoomRedaction,
    #[strum(to_string = "m.room.third_party_invite")]
    RoomThirdPartyInvite,
    #[strum(to_string = "m.tag")]
    RoomTag,
    #[strum(to_string = "m.presence")]
    Presence,
    #[strum(to_string = "m.typing")]
    Typing,
    #[strum(to_string = "m.call.invite")]
    CallInvite,
    #[strum(to_string = "m.call.candidates")]
    CallCandidates,
    #[strum(to_string = "m.call.answer")]
    CallAnswer,
    #[strum(to_string = "m.call.hangup")]
    CallHangup,
    #[strum(to_string = "m.reaction")]
    Reaction,
    #[strum(to_string = "m.receipt")]
    Receipt,
    #[strum(to_string = "m.room.tombstone")]
    RoomTombstone,
    #[strum(to_string = "m.key.verification.start")]
    KeyVerificationStart,
    #[strum(to_string = "m.key.verification.accept")]
    KeyVerificationAccept,
    #[strum(to_string = "m.key.verification.key")]
    KeyVerificationKey,
    #[strum(to_string = "m.key.verification.mac")]
    KeyVerificationMac,
    #[strum(to_string = "m.key.verification.cancel")]
    KeyVerificationCancel,
    #[strum(default)]
    Custom(String),
}

impl EventType {
    /// Total conversion from a protocol type string.
    pub fn of(type_string: &str) -> Self {
        type_string
            .parse()
            .unwrap_or_else(|_| EventType::Custom(type_string.to_string()))
    }

    /// Whether this type belongs to the fixed base set.
    pub fn is_base(&self) -> bool {
        !matches!(self, EventType::Custom(_))
    }
}

const BASE_TYPES: &[EventType] = &[
    EventType::FullyRead,
    EventType::RoomName,
    EventType::RoomTopic,
    EventType::RoomAvatar,
    EventType::RoomMember,
    EventType::RoomCreate,
    EventType::RoomJoinRules,
    EventType::RoomPowerLevels,
    EventType::RoomAliases,
    EventType::RoomCanonicalAlias,
    EventType::RoomEncrypted,
    EventType::RoomEncryption,
    EventType::RoomGuestAccess,
    EventType::RoomHistoryVisibility,
    EventType::RoomKey,
    EventType::ForwardedRoomKey,
    EventType::RoomKeyRequest,
    EventType::RoomMessage,
    EventType::RoomMessageFeedback,
    EventType::RoomRedaction,
    EventType::RoomThirdPartyInvite,
    EventType::RoomTag,
    EventType::Presence,
    EventType::Typing,
    EventType::CallInvite,
    EventType::CallCandidates,
    EventType::CallAnswer,
    EventType::CallHangup,
    EventType::Reaction,
    EventType::Receipt,
    EventType::RoomTombstone,
    EventType::KeyVerificationStart,
    EventType::KeyVerificationAccept,
    EventType::KeyVerificationKey,
    EventType::KeyVerificationMac,
    EventType::KeyVerificationCancel,
];

/// Allow-list of event types the global listener re-emits: the fixed base
/// set plus whatever custom types the host registers.
pub struct EventTypeRegistry {
    additional: RwLock<HashSet<String>>,
}

impl Default for EventTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTypeRegistry {
    pub fn new() -> Self {
        Self {
            additional: RwLock::new(HashSet::new()),
        }
    }

    /// Replaces the set of caller-registered custom event types.
    pub async fn set_additional_types(&self, types: Vec<String>) {
        let mut additional = self.additional.write().await;
        debug!(count = types.len(), "additional event types registered");
        *additional = types.into_iter().collect();
    }

    pub async fn is_supported(&self, event_type: &EventType) -> bool {
        match event_type {
            EventType::Custom(type_string) => {
                self.additional.read().await.contains(type_string)
            }
            _ => true,
        }
    }

    /// All channel names a host may receive notifications on.
    pub async fn channels(&self) -> Vec<String> {
        let mut channels = vec![
            ROOM_BACKWARDS_CHANNEL.to_string(),
            ROOM_FORWARDS_CHANNEL.to_string(),
        ];
        channels.extend(BASE_TYPES.iter().map(|event_type| event_type.to_string()));
        channels.extend(self.additional.read().await.iter().cloned());
        channels
    }
}
