//! Notifications pushed up to the presentation/host layer.
//!
//! The session is the single producer; the host drains the channel and
//! re-renders from the read-only projections.  Missing an event is harmless:
//! every payload carries (or points at) the full current view.

use serde::Serialize;

use causerie_shared::{PresenceRecord, RoomId};

use crate::connection::ConnectionState;
use crate::messages::Message;
use crate::rooms::Room;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferDirection {
    Upload,
    Download,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A message was first observed (locally or from the feed).
    MessageAdded { room: RoomId, message: Message },
    /// The currently-typing set of a room changed.
    TypingChanged { room: RoomId, users: Vec<String> },
    /// The online set was recomputed (ingest or liveness tick).
    PresenceChanged { online: Vec<PresenceRecord> },
    /// A room registry entry appeared or changed.
    RoomUpdated { room: Room },
    /// A room's member set changed.
    MembersChanged { room: RoomId, members: Vec<String> },
    /// Connection lifecycle transition.
    ConnectionChanged { state: ConnectionState },
    /// A file transfer progressed through a milestone.
    TransferProgress {
        id: String,
        direction: TransferDirection,
        percent: u8,
    },
}
