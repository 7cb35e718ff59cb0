//! Feed ingestion loops.
//!
//! One spawned loop per subscription: parse the raw mutation at the record
//! boundary, apply it to the owning projection, notify the host.  A
//! malformed or hostile mutation is logged and dropped; it must never tear
//! down the loop, since the same subscription carries every other peer's
//! legitimate data.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use causerie_graph::{path, GraphStore};
use causerie_shared::crypto::SymmetricKey;
use causerie_shared::{
    now_ms, MemberRecord, MessageRecord, PresenceRecord, RoomId, RoomRecord, TypingRecord,
};

use crate::events::SessionEvent;
use crate::messages::{Message, MessageLog};
use crate::presence::PresenceTracker;
use crate::rooms::RoomDirectory;
use crate::typing::TypingTracker;

pub(crate) fn spawn_message_feed(
    graph: &Arc<dyn GraphStore>,
    room: RoomId,
    key: SymmetricKey,
    log: Arc<Mutex<MessageLog>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    let mut sub = graph.subscribe(&path::messages(&room));
    tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            let record = match MessageRecord::from_value(&event.value) {
                Ok(record) => record,
                Err(e) => {
                    debug!(room = %room, error = %e, "dropping malformed message record");
                    continue;
                }
            };

            let message = Message::from_record(&record, &room, &key);
            let inserted = match log.lock() {
                Ok(mut log) => log.insert(message.clone()),
                Err(_) => continue,
            };
            if inserted {
                let _ = events.send(SessionEvent::MessageAdded {
                    room: room.clone(),
                    message,
                });
            }
        }
    })
}

pub(crate) fn spawn_typing_feed(
    graph: &Arc<dyn GraphStore>,
    room: RoomId,
    typing: Arc<Mutex<TypingTracker>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    let mut sub = graph.subscribe(&path::typing(&room));
    tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            let record = match TypingRecord::from_value(&event.key, &event.value) {
                Ok(record) => record,
                Err(e) => {
                    debug!(room = %room, error = %e, "dropping malformed typing record");
                    continue;
                }
            };

            let users = match typing.lock() {
                Ok(mut typing) => {
                    typing.set(&room, &event.key, record.typing);
                    typing.typing_users(&room)
                }
                Err(_) => continue,
            };
            let _ = events.send(SessionEvent::TypingChanged {
                room: room.clone(),
                users,
            });
        }
    })
}

pub(crate) fn spawn_presence_feed(
    graph: &Arc<dyn GraphStore>,
    presence: Arc<Mutex<PresenceTracker>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    let mut sub = graph.subscribe(&path::users());
    tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            let record = match PresenceRecord::from_value(&event.key, &event.value) {
                Ok(record) => record,
                Err(e) => {
                    debug!(user = %event.key, error = %e, "dropping malformed presence record");
                    continue;
                }
            };

            let online = match presence.lock() {
                Ok(mut presence) => {
                    presence.ingest(record);
                    presence.online_users(now_ms())
                }
                Err(_) => continue,
            };
            let _ = events.send(SessionEvent::PresenceChanged { online });
        }
    })
}

pub(crate) fn spawn_rooms_feed(
    graph: &Arc<dyn GraphStore>,
    rooms: Arc<Mutex<RoomDirectory>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    let mut sub = graph.subscribe(&path::rooms());
    tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            let record = match RoomRecord::from_value(&event.key, &event.value) {
                Ok(record) => record,
                Err(e) => {
                    debug!(room = %event.key, error = %e, "dropping malformed room record");
                    continue;
                }
            };

            let name = record.name.clone();
            let room = match rooms.lock() {
                Ok(mut rooms) => {
                    rooms.ingest_room(record);
                    rooms.get(&name).cloned()
                }
                Err(_) => continue,
            };
            if let Some(room) = room {
                let _ = events.send(SessionEvent::RoomUpdated { room });
            }
        }
    })
}

pub(crate) fn spawn_members_feed(
    graph: &Arc<dyn GraphStore>,
    room: RoomId,
    rooms: Arc<Mutex<RoomDirectory>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    let mut sub = graph.subscribe(&path::members(&room));
    tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            let record = match MemberRecord::from_value(&event.key, &event.value) {
                Ok(record) => record,
                Err(e) => {
                    debug!(room = %room, error = %e, "dropping malformed member record");
                    continue;
                }
            };

            let members = match rooms.lock() {
                Ok(mut rooms) => {
                    rooms.ingest_member(room.as_str(), record);
                    rooms.members(room.as_str())
                }
                Err(_) => continue,
            };
            let _ = events.send(SessionEvent::MembersChanged {
                room: room.clone(),
                members,
            });
        }
    })
}
