//! Pure mappings from protocol client entities to the plain data shapes
//! crossing the bridge boundary.
//!
//! Projections are total: missing protocol fields map to an explicit null,
//! never to an absent key, and the output carries no reference back into
//! the client's objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ClientEvent, ClientMember, ClientRoom, Membership, SearchPage};

/// Snapshot of one event. All seven fields are always present when
/// serialized; any of them may be null.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectedEvent {
    pub event_type: Option<String>,
    pub event_id: Option<String>,
    pub room_id: Option<String>,
    pub sender_id: Option<String>,
    pub age: Option<i64>,
    pub content: Option<Value>,
    pub ts: Option<i64>,
}

/// Snapshot of one room member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectedMember {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: Option<String>,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: Option<String>,
    pub membership: String,
}

/// Snapshot of one room.
///
/// `members` is an empty sequence when no member list was fetched, never
/// absent; callers must not conflate that with a room that has no members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectedRoom {
    pub room_id: String,
    pub name: Option<String>,
    pub notification_count: Option<u64>,
    pub highlight_count: Option<u64>,
    pub is_direct: Option<bool>,
    pub last_message: ProjectedEvent,
    #[serde(rename = "isLeft")]
    pub is_left: bool,
    pub members: Vec<ProjectedMember>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchContext {
    pub before: Vec<ProjectedEvent>,
    pub after: Vec<ProjectedEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContextTokens {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectedSearchHit {
    pub event: ProjectedEvent,
    pub context: SearchContext,
    pub token: ContextTokens,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectedSearchPage {
    pub count: Option<u64>,
    pub next_batch: Option<String>,
    pub results: Vec<ProjectedSearchHit>,
}

pub fn project_event(event: &ClientEvent) -> ProjectedEvent {
    ProjectedEvent {
        event_type: event.event_type.clone(),
        event_id: event.event_id.clone(),
        room_id: event.room_id.clone(),
        sender_id: event.sender.clone(),
        age: event.age,
        content: event.content.clone(),
        ts: event.origin_server_ts,
    }
}

/// The lowercase membership token. Unrecognized values fall back to `join`
/// rather than failing.
pub fn membership_token(membership: Membership) -> &'static str {
    match membership {
        Membership::Leave => "leave",
        Membership::Ban => "ban",
        Membership::Invite => "invite",
        Membership::Kick => "kick",
        Membership::Join | Membership::Unknown => "join",
    }
}

pub fn project_member(member: &ClientMember) -> ProjectedMember {
    ProjectedMember {
        user_id: member.user_id.clone(),
        name: member.display_name.clone(),
        avatar_url: member.avatar_url.clone(),
        membership: membership_token(member.membership).to_string(),
    }
}

/// Projects a room, with the member list when one was fetched alongside.
pub fn project_room(room: &ClientRoom, members: Option<&[ClientMember]>) -> ProjectedRoom {
    let last_message = room
        .last_message
        .as_ref()
        .map(project_event)
        .unwrap_or_default();

    ProjectedRoom {
        room_id: room.room_id.clone(),
        name: room.name.clone(),
        notification_count: room.notification_count,
        highlight_count: room.highlight_count,
        is_direct: room.is_direct,
        last_message,
        is_left: room.own_membership == Membership::Leave,
        members: members
            .map(|members| members.iter().map(project_member).collect())
            .unwrap_or_default(),
    }
}

pub fn project_search(page: &SearchPage) -> ProjectedSearchPage {
    ProjectedSearchPage {
        count: page.count,
        next_batch: page.next_batch.clone(),
        results: page
            .hits
            .iter()
            .map(|hit| ProjectedSearchHit {
                event: project_event(&hit.event),
                context: SearchContext {
                    before: hit.before.iter().map(project_event).collect(),
                    after: hit.after.iter().map(project_event).collect(),
                },
                token: ContextTokens {
                    start: hit.context_start.clone(),
                    end: hit.context_end.clone(),
                },
            })
            .collect(),
    }
}
