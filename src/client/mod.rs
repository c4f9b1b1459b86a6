// Protocol client boundary
//
// Everything that talks to the wire lives behind the ProtocolClient trait:
// authentication, sync, timelines, media. The bridge only coordinates.

// Public API - what other modules can use
pub use memory::{
    InMemoryProtocolClient, RecordedMessagesCall, RecordedPaginateCall, RecordedSend,
};
pub use protocol::{ClientError, EventSubscription, ProtocolClient};
pub use types::{
    ClientEvent, ClientMember, ClientRoom, CreateRoomRequest, Credentials, Direction, Membership,
    MessageKind, MessagePage, PublicRoomEntry, PusherRequest, SearchHit, SearchPage, TimelineItem,
    UserAttributes,
};

// Internal modules
mod memory;
mod protocol;
mod types;
