//! Wire record shapes observed on (and written to) the replicated graph.
//!
//! Raw mutations arrive as untyped JSON nodes, possibly partial (a node being
//! assembled field-by-field yields incomplete snapshots) and possibly
//! replayed many times.  Everything entering the reconcilers passes through
//! the `from_value` constructors here; a shape that does not validate maps to
//! a [`RecordError`] and is dropped at the boundary instead of flowing
//! further as an open-ended dynamic value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordError;

fn string_field(obj: &Map<String, Value>, name: &'static str) -> Result<String, RecordError> {
    match obj.get(name) {
        None | Some(Value::Null) => Err(RecordError::MissingField(name)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(RecordError::InvalidField(name)),
    }
}

fn int_field(obj: &Map<String, Value>, name: &'static str) -> Result<i64, RecordError> {
    match obj.get(name) {
        None | Some(Value::Null) => Err(RecordError::MissingField(name)),
        Some(v) => v.as_i64().ok_or(RecordError::InvalidField(name)),
    }
}

fn bool_field(obj: &Map<String, Value>, name: &'static str) -> Result<bool, RecordError> {
    match obj.get(name) {
        None | Some(Value::Null) => Err(RecordError::MissingField(name)),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(RecordError::InvalidField(name)),
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<String>, RecordError> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RecordError::InvalidField(name)),
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat message as stored on the graph.  `text` holds the armored
/// ciphertext; a file transfer travels as a JSON string field because graph
/// nodes hold scalar fields only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub author_name: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_transfer_json: Option<String>,
}

impl MessageRecord {
    /// Validate a raw graph node.  Required identity fields are checked
    /// first (an incomplete or tombstoned record fails there); a record with
    /// neither text nor an attached file reference is rejected afterwards.
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;

        let id = string_field(obj, "id")?;
        let author_name = string_field(obj, "authorName")?;
        let timestamp = int_field(obj, "timestamp")?;
        let text = optional_string(obj, "text")?;
        let file_transfer_json = optional_string(obj, "fileTransferJson")?;

        if text.is_none() && file_transfer_json.is_none() {
            return Err(RecordError::NoPayload);
        }

        Ok(Self {
            id,
            author_name,
            timestamp,
            text,
            file_transfer_json,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("message record serializes")
    }
}

// ---------------------------------------------------------------------------
// File transfer
// ---------------------------------------------------------------------------

/// An encrypted file payload bound to its owning message.  `file_data` and
/// `thumbnail` are base64-armored ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileTransfer {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub file_data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl FileTransfer {
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(|_| RecordError::InvalidField("fileTransferJson"))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("file transfer serializes")
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// A user's liveness record, keyed by username on the graph.  Last-write-wins
/// per user; heartbeats rewrite `online` and `lastSeen` in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub username: String,
    pub online: bool,
    pub last_seen: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl PresenceRecord {
    /// Validate a raw presence node.  The username inside the record wins;
    /// the graph key it was stored under is the fallback.
    pub fn from_value(key: &str, value: &Value) -> Result<Self, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;

        let username = match optional_string(obj, "username")? {
            Some(name) => name,
            None if !key.is_empty() => key.to_string(),
            None => return Err(RecordError::MissingField("username")),
        };
        let online = bool_field(obj, "online")?;
        let last_seen = int_field(obj, "lastSeen")?;
        let public_key = optional_string(obj, "publicKey")?;

        Ok(Self {
            username,
            online,
            last_seen,
            public_key,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("presence record serializes")
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// A room registry entry, keyed by room name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created: i64,
    #[serde(rename = "type")]
    pub visibility: Visibility,
}

impl RoomRecord {
    pub fn from_value(key: &str, value: &Value) -> Result<Self, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;

        let name = match optional_string(obj, "name")? {
            Some(name) => name,
            None if !key.is_empty() => key.to_string(),
            None => return Err(RecordError::MissingField("name")),
        };
        let description = optional_string(obj, "description")?.unwrap_or_default();
        let created = int_field(obj, "created")?;
        let visibility = match obj.get("type") {
            None | Some(Value::Null) => Visibility::Public,
            Some(Value::String(s)) if s == "public" => Visibility::Public,
            Some(Value::String(s)) if s == "private" => Visibility::Private,
            Some(_) => return Err(RecordError::InvalidField("type")),
        };

        Ok(Self {
            name,
            description,
            created,
            visibility,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("room record serializes")
    }
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// A member-slot mutation under a room's members path.  A string value means
/// the member is present; a null write means the member is absent going
/// forward (no retroactive history rewriting).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRecord {
    Present { username: String },
    Absent { username: String },
}

impl MemberRecord {
    pub fn from_value(key: &str, value: &Value) -> Result<Self, RecordError> {
        match value {
            Value::Null if !key.is_empty() => Ok(Self::Absent {
                username: key.to_string(),
            }),
            Value::String(s) if !s.is_empty() => Ok(Self::Present {
                username: s.clone(),
            }),
            Value::Bool(true) if !key.is_empty() => Ok(Self::Present {
                username: key.to_string(),
            }),
            _ => Err(RecordError::InvalidField("member")),
        }
    }
}

// ---------------------------------------------------------------------------
// Typing
// ---------------------------------------------------------------------------

/// A typing flag, keyed by username under a room's typing path.  Explicitly
/// cleared by the sender, never aged out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingRecord {
    pub typing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl TypingRecord {
    pub fn from_value(key: &str, value: &Value) -> Result<Self, RecordError> {
        if key.is_empty() {
            return Err(RecordError::MissingField("username"));
        }
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;
        let typing = bool_field(obj, "typing")?;
        let timestamp = match obj.get("timestamp") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_i64().ok_or(RecordError::InvalidField("timestamp"))?),
        };

        Ok(Self { typing, timestamp })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("typing record serializes")
    }
}
