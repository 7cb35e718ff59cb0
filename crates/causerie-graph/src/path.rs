//! Typed graph paths.
//!
//! All per-room state is namespaced under `chat/rooms/<room>/...`, except the
//! general room whose message and typing feeds live at the historical
//! top-level paths.

use causerie_shared::RoomId;

/// A slash-separated location in the replicated graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphPath(String);

impl GraphPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GraphPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `chat/users` — presence records keyed by username.
pub fn users() -> GraphPath {
    GraphPath::new("chat/users")
}

/// `chat/rooms` — the room registry keyed by room name.
pub fn rooms() -> GraphPath {
    GraphPath::new("chat/rooms")
}

/// The message collection for a room.
pub fn messages(room: &RoomId) -> GraphPath {
    if room.is_general() {
        GraphPath::new("chat/messages")
    } else {
        GraphPath::new(format!("chat/rooms/{room}/messages"))
    }
}

/// The typing-indicator node for a room, keyed by username.
pub fn typing(room: &RoomId) -> GraphPath {
    if room.is_general() {
        GraphPath::new("chat/typing")
    } else {
        GraphPath::new(format!("chat/rooms/{room}/typing"))
    }
}

/// The member set for a room.
pub fn members(room: &RoomId) -> GraphPath {
    GraphPath::new(format!("chat/rooms/{room}/members"))
}
