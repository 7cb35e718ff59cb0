//! Message reconciliation.
//!
//! The replicated store re-emits a message record on every field write and on
//! every new subscriber attach, so the same logical message is delivered many
//! times, in no particular order.  The projection here absorbs that:
//! insertion is idempotent by message id, and the ordered view is recomputed
//! lazily instead of maintained incrementally (the set is append-only and
//! small per session).

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use causerie_shared::constants::UNDECRYPTABLE_PLACEHOLDER;
use causerie_shared::crypto::{self, SymmetricKey};
use causerie_shared::{FileTransfer, MessageId, MessageRecord, RoomId};

/// A reconciled chat message.  Never mutated after creation; removed only by
/// an explicit projection-local clear.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub room: RoomId,
    pub author_name: String,
    pub timestamp: i64,
    /// Decrypted plaintext, or the placeholder when decryption fails.
    pub text: String,
    /// The armored ciphertext as observed on the wire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_transfer: Option<FileTransfer>,
}

impl Message {
    /// Build the projection entry for a validated wire record.
    ///
    /// A decryption failure substitutes the placeholder text instead of
    /// dropping the message — the author and timestamp are still meaningful.
    /// An unparseable file payload degrades to a message without a file.
    pub fn from_record(record: &MessageRecord, room: &RoomId, key: &SymmetricKey) -> Self {
        let text = match record.text.as_deref() {
            None => String::new(),
            Some(ciphertext) if ciphertext.trim().is_empty() => String::new(),
            Some(ciphertext) => match crypto::decrypt_text(key, ciphertext) {
                Ok(plain) => plain,
                Err(_) => UNDECRYPTABLE_PLACEHOLDER.to_string(),
            },
        };

        let file_transfer = record
            .file_transfer_json
            .as_deref()
            .and_then(|json| match FileTransfer::from_json(json) {
                Ok(transfer) => Some(transfer),
                Err(e) => {
                    debug!(error = %e, id = %record.id, "unparseable file transfer payload");
                    None
                }
            });

        Self {
            id: MessageId(record.id.clone()),
            room: room.clone(),
            author_name: record.author_name.clone(),
            timestamp: record.timestamp,
            text,
            encrypted_text: record.text.clone(),
            file_transfer,
        }
    }
}

/// Per-room message projection, keyed by message id.
#[derive(Debug, Default)]
pub struct MessageLog {
    rooms: HashMap<RoomId, HashMap<MessageId, Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent merge: returns `true` when the message was new, `false`
    /// when a message with this id is already present (no-op).
    pub fn insert(&mut self, message: Message) -> bool {
        let room = self.rooms.entry(message.room.clone()).or_default();
        if room.contains_key(&message.id) {
            return false;
        }
        room.insert(message.id.clone(), message);
        true
    }

    pub fn contains(&self, room: &RoomId, id: &MessageId) -> bool {
        self.rooms
            .get(room)
            .map(|msgs| msgs.contains_key(id))
            .unwrap_or(false)
    }

    /// The room's messages sorted ascending by timestamp, ties broken by id
    /// string order for determinism.
    pub fn ordered_view(&self, room: &RoomId) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .rooms
            .get(room)
            .map(|msgs| msgs.values().cloned().collect())
            .unwrap_or_default();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        messages
    }

    pub fn count(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map(|msgs| msgs.len()).unwrap_or(0)
    }

    /// Projection-only clear; nothing is removed from the replicated store.
    pub fn clear(&mut self, room: &RoomId) {
        self.rooms.remove(room);
    }

    pub fn clear_all(&mut self) {
        self.rooms.clear();
    }
}
