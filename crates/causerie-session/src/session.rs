//! The session context: owns the graph handle, the channel key, every
//! projection, and every spawned task (feed loops, heartbeat, liveness tick,
//! reconnect timer), with an explicit `start`/`stop` lifecycle so teardown is
//! deterministic.
//!
//! Every mutating operation applies to the local projection first (optimistic
//! echo) and then writes the mutation into the replicated store; remote
//! convergence is never separately awaited.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use causerie_graph::{path, GraphStore};
use causerie_shared::constants::{HEARTBEAT_INTERVAL_MS, LIVENESS_TICK_MS};
use causerie_shared::crypto::{self, SymmetricKey};
use causerie_shared::{
    now_ms, ChatError, KeyPair, MemberRecord, MessageId, MessageRecord, PresenceRecord, RoomId,
    RoomRecord, ValidationError, Visibility,
};

use crate::connection::{ConnectionState, ConnectionSupervisor};
use crate::events::SessionEvent;
use crate::feed;
use crate::files::{FileInput, FileTransferPipeline};
use crate::messages::{Message, MessageLog};
use crate::presence::PresenceTracker;
use crate::rooms::{Room, RoomDirectory};
use crate::typing::TypingTracker;

/// Session configuration.  The channel secret is the pre-shared deployment
/// string every client derives the symmetric key from.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub channel_secret: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_secret: causerie_shared::constants::DEFAULT_CHANNEL_SECRET.to_string(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ChatError> {
    mutex.lock().map_err(|_| ChatError::StatePoisoned)
}

pub struct Session {
    graph: Arc<dyn GraphStore>,
    channel_key: SymmetricKey,

    messages: Arc<Mutex<MessageLog>>,
    typing: Arc<Mutex<TypingTracker>>,
    presence: Arc<Mutex<PresenceTracker>>,
    rooms: Arc<Mutex<RoomDirectory>>,
    connection: Arc<Mutex<ConnectionSupervisor>>,
    transfers: FileTransferPipeline,

    events: mpsc::UnboundedSender<SessionEvent>,

    feeds: Vec<JoinHandle<()>>,
    room_feeds: HashMap<RoomId, Vec<JoinHandle<()>>>,
    heartbeat: Option<JoinHandle<()>>,
    liveness: Option<JoinHandle<()>>,

    current_user: Option<String>,
    key_pair: Option<KeyPair>,
    started: bool,
}

impl Session {
    /// Build a session over a graph store.  Returns the receiving half of
    /// the host notification channel.
    pub fn new(
        graph: Arc<dyn GraphStore>,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let channel_key = crypto::derive_channel_key(&config.channel_secret);

        let session = Self {
            graph,
            channel_key,
            messages: Arc::new(Mutex::new(MessageLog::new())),
            typing: Arc::new(Mutex::new(TypingTracker::new())),
            presence: Arc::new(Mutex::new(PresenceTracker::new())),
            rooms: Arc::new(Mutex::new(RoomDirectory::new())),
            connection: Arc::new(Mutex::new(ConnectionSupervisor::new())),
            transfers: FileTransferPipeline::new(channel_key, events.clone()),
            events,
            feeds: Vec::new(),
            room_feeds: HashMap::new(),
            heartbeat: None,
            liveness: None,
            current_user: None,
            key_pair: None,
            started: false,
        };
        (session, events_rx)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Attach to the replica feeds: presence, the room registry, and the
    /// general room.  Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        self.feeds.push(feed::spawn_presence_feed(
            &self.graph,
            Arc::clone(&self.presence),
            self.events.clone(),
        ));
        self.feeds.push(feed::spawn_rooms_feed(
            &self.graph,
            Arc::clone(&self.rooms),
            self.events.clone(),
        ));
        self.spawn_room_feeds(&RoomId::general());

        info!("session started");
    }

    /// Detach every subscription and abort every timer.  In-flight work
    /// completes and its results are discarded.
    pub fn stop(&mut self) {
        for task in self.feeds.drain(..) {
            task.abort();
        }
        for (_, tasks) in self.room_feeds.drain() {
            for task in tasks {
                task.abort();
            }
        }
        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
        if let Some(task) = self.liveness.take() {
            task.abort();
        }
        if let Ok(mut connection) = self.connection.lock() {
            connection.reset_reconnect_attempts();
        }
        self.started = false;

        info!("session stopped");
    }

    fn spawn_room_feeds(&mut self, room: &RoomId) {
        if self.room_feeds.contains_key(room) {
            return;
        }
        let tasks = vec![
            feed::spawn_message_feed(
                &self.graph,
                room.clone(),
                self.channel_key,
                Arc::clone(&self.messages),
                self.events.clone(),
            ),
            feed::spawn_typing_feed(
                &self.graph,
                room.clone(),
                Arc::clone(&self.typing),
                self.events.clone(),
            ),
            feed::spawn_members_feed(
                &self.graph,
                room.clone(),
                Arc::clone(&self.rooms),
                self.events.clone(),
            ),
        ];
        self.room_feeds.insert(room.clone(), tasks);
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Encrypt and publish a chat message, echoing the plaintext version
    /// into the local projection immediately so the sender sees it before
    /// the round trip.
    pub fn submit(
        &self,
        plaintext: &str,
        author_name: &str,
        room: Option<&RoomId>,
    ) -> Result<Message, ChatError> {
        let room = room.cloned().unwrap_or_else(RoomId::general);
        let id = MessageId::generate();
        let timestamp = now_ms();
        let encrypted = crypto::encrypt_text(&self.channel_key, plaintext)?;

        let message = Message {
            id: id.clone(),
            room: room.clone(),
            author_name: author_name.to_string(),
            timestamp,
            text: plaintext.to_string(),
            encrypted_text: Some(encrypted.clone()),
            file_transfer: None,
        };
        if lock(&self.messages)?.insert(message.clone()) {
            let _ = self.events.send(SessionEvent::MessageAdded {
                room: room.clone(),
                message: message.clone(),
            });
        }

        let record = MessageRecord {
            id: id.0,
            author_name: author_name.to_string(),
            timestamp,
            text: Some(encrypted),
            file_transfer_json: None,
        };
        self.graph.set(&path::messages(&room), record.to_value());

        Ok(message)
    }

    /// Publish a message carrying a file.  The file is prepared (and the
    /// size gate applied) before anything is written to the store; blank
    /// text travels as an empty string rather than being encrypted.
    pub fn submit_with_file(
        &self,
        text: &str,
        file: &FileInput,
        author_name: &str,
        room: Option<&RoomId>,
    ) -> Result<Message, ChatError> {
        let room = room.cloned().unwrap_or_else(RoomId::general);
        let id = MessageId::generate();
        let timestamp = now_ms();

        let transfer = self.transfers.prepare_file(file, &id.0)?;

        let text = text.trim();
        let encrypted = if text.is_empty() {
            String::new()
        } else {
            crypto::encrypt_text(&self.channel_key, text)?
        };

        let message = Message {
            id: id.clone(),
            room: room.clone(),
            author_name: author_name.to_string(),
            timestamp,
            text: text.to_string(),
            encrypted_text: Some(encrypted.clone()),
            file_transfer: Some(transfer.clone()),
        };
        if lock(&self.messages)?.insert(message.clone()) {
            let _ = self.events.send(SessionEvent::MessageAdded {
                room: room.clone(),
                message: message.clone(),
            });
        }

        let record = MessageRecord {
            id: id.0,
            author_name: author_name.to_string(),
            timestamp,
            text: Some(encrypted),
            file_transfer_json: Some(transfer.to_json()),
        };
        self.graph.set(&path::messages(&room), record.to_value());

        Ok(message)
    }

    /// The room's messages, ascending by timestamp (ties by id).
    pub fn ordered_view(&self, room: &RoomId) -> Vec<Message> {
        self.messages
            .lock()
            .map(|log| log.ordered_view(room))
            .unwrap_or_default()
    }

    /// Projection-only clear.
    pub fn clear_messages(&self, room: &RoomId) {
        if let Ok(mut log) = self.messages.lock() {
            log.clear(room);
        }
    }

    // ------------------------------------------------------------------
    // Typing
    // ------------------------------------------------------------------

    /// Write (and locally apply) a typing flag for `username` in `room`.
    pub fn set_typing(&self, username: &str, typing: bool, room: Option<&RoomId>) {
        let room = room.cloned().unwrap_or_else(RoomId::general);
        let record = causerie_shared::TypingRecord {
            typing,
            timestamp: Some(now_ms()),
        };
        self.graph
            .put(&path::typing(&room), username, record.to_value());

        if let Ok(mut tracker) = self.typing.lock() {
            tracker.set(&room, username, typing);
            let users = tracker.typing_users(&room);
            let _ = self
                .events
                .send(SessionEvent::TypingChanged { room, users });
        }
    }

    pub fn typing_users(&self, room: &RoomId) -> Vec<String> {
        self.typing
            .lock()
            .map(|tracker| tracker.typing_users(room))
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    /// Log in: generate a keypair, publish the presence record, start the
    /// heartbeat and the liveness recompute tick.
    pub fn login(&mut self, username: &str) -> Result<KeyPair, ChatError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }

        let key_pair = KeyPair::generate();
        let record = PresenceRecord {
            username: username.to_string(),
            online: true,
            last_seen: now_ms(),
            public_key: Some(key_pair.verify_public.clone()),
        };

        lock(&self.presence)?.ingest(record.clone());
        let _ = self.events.send(SessionEvent::PresenceChanged {
            online: self.online_users(),
        });
        self.graph
            .put(&path::users(), username, record.to_value());

        // Replace any timers from a previous login.
        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
        if let Some(task) = self.liveness.take() {
            task.abort();
        }

        let graph = Arc::clone(&self.graph);
        let heartbeat_user = username.to_string();
        self.heartbeat = Some(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS));
            // The login write above covers the immediate tick.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                graph.put(
                    &path::users(),
                    &heartbeat_user,
                    json!({ "online": true, "lastSeen": now_ms() }),
                );
            }
        }));

        let presence = Arc::clone(&self.presence);
        let events = self.events.clone();
        self.liveness = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(LIVENESS_TICK_MS));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let online = match presence.lock() {
                    Ok(mut presence) => {
                        presence.touch();
                        presence.online_users(now_ms())
                    }
                    Err(_) => continue,
                };
                let _ = events.send(SessionEvent::PresenceChanged { online });
            }
        }));

        self.current_user = Some(username.to_string());
        self.key_pair = Some(key_pair.clone());

        info!(user = username, "logged in");
        Ok(key_pair)
    }

    /// Log out: publish the offline record, stop both periodic tasks, clear
    /// the keypair.
    pub fn logout(&mut self) {
        let Some(username) = self.current_user.take() else {
            return;
        };
        let now = now_ms();

        self.graph.put(
            &path::users(),
            &username,
            json!({ "online": false, "lastSeen": now }),
        );
        if let Ok(mut presence) = self.presence.lock() {
            presence.mark_offline(&username, now);
        }
        let _ = self.events.send(SessionEvent::PresenceChanged {
            online: self.online_users(),
        });

        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
        if let Some(task) = self.liveness.take() {
            task.abort();
        }
        self.key_pair = None;

        info!(user = %username, "logged out");
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn key_pair(&self) -> Option<&KeyPair> {
        self.key_pair.as_ref()
    }

    pub fn online_users(&self) -> Vec<PresenceRecord> {
        self.presence
            .lock()
            .map(|presence| presence.online_users(now_ms()))
            .unwrap_or_default()
    }

    pub fn online_count(&self) -> usize {
        self.presence
            .lock()
            .map(|presence| presence.online_count(now_ms()))
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    /// Create a room, publish its record, and auto-join it locally.
    pub fn create_room(
        &mut self,
        name: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<Room, ChatError> {
        let name = RoomDirectory::validate_name(name)?;
        let record = RoomRecord {
            name: name.clone(),
            description: description.trim().to_string(),
            created: now_ms(),
            visibility,
        };

        let room = {
            let mut rooms = lock(&self.rooms)?;
            rooms.ingest_room(record.clone());
            rooms.mark_joined(&name);
            rooms.get(&name).cloned().ok_or(ChatError::StatePoisoned)?
        };
        let _ = self
            .events
            .send(SessionEvent::RoomUpdated { room: room.clone() });

        self.graph.put(&path::rooms(), &name, record.to_value());
        self.spawn_room_feeds(&RoomId::new(name.as_str()));

        info!(room = %name, "room created");
        Ok(room)
    }

    /// Append `username` to the room's member set and attach its feeds.
    pub fn join_room(&mut self, room: &RoomId, username: &str) -> Result<(), ChatError> {
        let members = {
            let mut rooms = lock(&self.rooms)?;
            rooms.mark_joined(room.as_str());
            rooms.ingest_member(
                room.as_str(),
                MemberRecord::Present {
                    username: username.to_string(),
                },
            );
            rooms.members(room.as_str())
        };
        let _ = self.events.send(SessionEvent::MembersChanged {
            room: room.clone(),
            members,
        });

        self.graph
            .put(&path::members(room), username, json!(username));
        self.spawn_room_feeds(room);

        info!(room = %room, user = username, "joined room");
        Ok(())
    }

    /// Null-write the member slot and detach the room's feeds.  Leaving the
    /// general room always fails.
    pub fn leave_room(&mut self, room: &RoomId, username: &str) -> Result<(), ChatError> {
        RoomDirectory::check_leavable(room.as_str())?;

        let members = {
            let mut rooms = lock(&self.rooms)?;
            rooms.ingest_member(
                room.as_str(),
                MemberRecord::Absent {
                    username: username.to_string(),
                },
            );
            rooms.mark_left(room.as_str());
            rooms.members(room.as_str())
        };
        let _ = self.events.send(SessionEvent::MembersChanged {
            room: room.clone(),
            members,
        });

        self.graph.put(&path::members(room), username, Value::Null);
        if let Some(tasks) = self.room_feeds.remove(room) {
            for task in tasks {
                task.abort();
            }
        }

        info!(room = %room, user = username, "left room");
        Ok(())
    }

    pub fn room(&self, name: &str) -> Option<Room> {
        self.rooms.lock().ok().and_then(|rooms| rooms.get(name).cloned())
    }

    pub fn room_members(&self, room: &RoomId) -> Vec<String> {
        self.rooms
            .lock()
            .map(|rooms| rooms.members(room.as_str()))
            .unwrap_or_default()
    }

    pub fn public_rooms(&self) -> Vec<Room> {
        self.rooms
            .lock()
            .map(|rooms| rooms.public_rooms())
            .unwrap_or_default()
    }

    pub fn my_rooms(&self) -> Vec<Room> {
        self.rooms
            .lock()
            .map(|rooms| rooms.my_rooms())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    fn emit_connection_state(&self) {
        if let Ok(connection) = self.connection.lock() {
            let _ = self.events.send(SessionEvent::ConnectionChanged {
                state: connection.snapshot(),
            });
        }
    }

    pub fn set_connecting(&self) {
        if let Ok(mut connection) = self.connection.lock() {
            connection.set_connecting();
        }
        self.emit_connection_state();
    }

    pub fn set_connected(&self, connected: bool) {
        if let Ok(mut connection) = self.connection.lock() {
            connection.set_connected(connected);
        }
        self.emit_connection_state();
    }

    pub fn set_is_host(&self, is_host: bool) {
        if let Ok(mut connection) = self.connection.lock() {
            connection.set_is_host(is_host);
        }
        self.emit_connection_state();
    }

    /// Schedule a reconnection attempt with capped exponential backoff;
    /// `None` once the attempt budget is exhausted.
    pub fn attempt_reconnect<F>(&self, retry: F) -> Option<Duration>
    where
        F: FnOnce() + Send + 'static,
    {
        let scheduled = self
            .connection
            .lock()
            .ok()
            .and_then(|mut connection| connection.attempt_reconnect(retry));
        self.emit_connection_state();
        scheduled
    }

    pub fn reset_reconnect_attempts(&self) {
        if let Ok(mut connection) = self.connection.lock() {
            connection.reset_reconnect_attempts();
        }
        self.emit_connection_state();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .lock()
            .map(|connection| connection.snapshot())
            .unwrap_or_else(|_| ConnectionSupervisor::new().snapshot())
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// The file transfer pipeline (progress queries, downloads, thumbnail
    /// decryption).
    pub fn transfers(&self) -> &FileTransferPipeline {
        &self.transfers
    }
}
