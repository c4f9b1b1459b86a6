use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Per-room continuation tokens for resumable backward history loads.
///
/// The token stored for a room marks the oldest point reached so far; an
/// absent entry means "start from live". Cursors follow a strict sequential
/// protocol per room and are not safe for concurrent pagination of the same
/// room.
pub struct CursorStore {
    cursors: RwLock<HashMap<String, String>>,
}

impl Default for CursorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorStore {
    pub fn new() -> Self {
        Self {
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, room_id: &str) -> Option<String> {
        self.cursors.read().await.get(room_id).cloned()
    }

    /// Records the continuation token returned by a successful fetch,
    /// overwriting whatever was stored. A fetch that came back without an
    /// end token clears the entry.
    pub async fn record(&self, room_id: &str, token: Option<String>) {
        let mut cursors = self.cursors.write().await;
        match token {
            Some(token) => {
                debug!(room_id = %room_id, token = %token, "pagination cursor recorded");
                cursors.insert(room_id.to_string(), token);
            }
            None => {
                debug!(room_id = %room_id, "pagination cursor cleared");
                cursors.remove(room_id);
            }
        }
    }

    /// The token to resume a non-initial load from. Missing cursors fall
    /// back to an empty token (fetch from live); that is a misuse signal,
    /// hence the warning.
    pub async fn resume_token(&self, room_id: &str) -> String {
        match self.get(room_id).await {
            Some(token) => token,
            None => {
                warn!(
                    room_id = %room_id,
                    "no pagination cursor for room; load with initial_load = true first"
                );
                String::new()
            }
        }
    }
}
