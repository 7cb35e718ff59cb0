//! Room membership.
//!
//! Rooms merge into the projection by name; member-set mutations append
//! newly observed ids, and a null write for a member's slot means absence
//! going forward (no retroactive history rewriting).  The `general` room is
//! the distinguished default: every client is joined to it and it can never
//! be left.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use causerie_shared::constants::GENERAL_ROOM;
use causerie_shared::{MemberRecord, RoomRecord, ValidationError, Visibility};

/// A reconciled room.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub name: String,
    pub description: String,
    pub created: i64,
    pub visibility: Visibility,
    pub members: BTreeSet<String>,
}

impl Room {
    /// Placeholder for a joined room whose registry record has not synced
    /// yet.
    fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            created: 0,
            visibility: Visibility::Public,
            members: BTreeSet::new(),
        }
    }

    fn from_record(record: RoomRecord) -> Self {
        Self {
            name: record.name,
            description: record.description,
            created: record.created,
            visibility: record.visibility,
            members: BTreeSet::new(),
        }
    }
}

/// Room and membership projection.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: HashMap<String, Room>,
    joined: BTreeSet<String>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        let mut joined = BTreeSet::new();
        joined.insert(GENERAL_ROOM.to_string());
        Self {
            rooms: HashMap::new(),
            joined,
        }
    }

    /// Reject empty (after trimming) room names before anything is written.
    pub fn validate_name(name: &str) -> Result<String, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyRoomName);
        }
        Ok(trimmed.to_string())
    }

    /// The general room is non-leavable, always.
    pub fn check_leavable(name: &str) -> Result<(), ValidationError> {
        if name == GENERAL_ROOM {
            return Err(ValidationError::GeneralRoomNotLeavable);
        }
        Ok(())
    }

    /// Merge an incoming room record by name, preserving any member set
    /// already observed.
    pub fn ingest_room(&mut self, record: RoomRecord) {
        match self.rooms.get_mut(&record.name) {
            Some(existing) => {
                existing.description = record.description;
                existing.created = record.created;
                existing.visibility = record.visibility;
            }
            None => {
                let room = Room::from_record(record);
                self.rooms.insert(room.name.clone(), room);
            }
        }
    }

    /// Apply a member-slot mutation for `room`.
    pub fn ingest_member(&mut self, room: &str, record: MemberRecord) {
        let entry = self
            .rooms
            .entry(room.to_string())
            .or_insert_with(|| Room::placeholder(room));
        match record {
            MemberRecord::Present { username } => {
                entry.members.insert(username);
            }
            MemberRecord::Absent { username } => {
                entry.members.remove(&username);
            }
        }
    }

    pub fn mark_joined(&mut self, name: &str) {
        self.joined.insert(name.to_string());
    }

    pub fn mark_left(&mut self, name: &str) {
        self.joined.remove(name);
    }

    pub fn is_joined(&self, name: &str) -> bool {
        self.joined.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    pub fn members(&self, name: &str) -> Vec<String> {
        self.rooms
            .get(name)
            .map(|room| room.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All known public rooms, name-ordered.
    pub fn public_rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .rooms
            .values()
            .filter(|room| room.visibility == Visibility::Public)
            .cloned()
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    /// The joined rooms, with placeholders for entries the registry has not
    /// synced yet.
    pub fn my_rooms(&self) -> Vec<Room> {
        self.joined
            .iter()
            .map(|name| {
                self.rooms
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| Room::placeholder(name))
            })
            .collect()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, visibility: Visibility) -> RoomRecord {
        RoomRecord {
            name: name.to_string(),
            description: format!("{name} room"),
            created: 100,
            visibility,
        }
    }

    #[test]
    fn test_general_is_joined_and_not_leavable() {
        let directory = RoomDirectory::new();
        assert!(directory.is_joined(GENERAL_ROOM));
        assert!(matches!(
            RoomDirectory::check_leavable(GENERAL_ROOM),
            Err(ValidationError::GeneralRoomNotLeavable)
        ));
        assert!(RoomDirectory::check_leavable("lounge").is_ok());
    }

    #[test]
    fn test_name_validation() {
        assert!(matches!(
            RoomDirectory::validate_name("   "),
            Err(ValidationError::EmptyRoomName)
        ));
        assert_eq!(RoomDirectory::validate_name("  lounge ").unwrap(), "lounge");
    }

    #[test]
    fn test_member_append_and_null_removal() {
        let mut directory = RoomDirectory::new();
        directory.ingest_room(record("lounge", Visibility::Public));

        directory.ingest_member(
            "lounge",
            MemberRecord::Present {
                username: "alice".into(),
            },
        );
        directory.ingest_member(
            "lounge",
            MemberRecord::Present {
                username: "bob".into(),
            },
        );
        assert_eq!(directory.members("lounge"), vec!["alice", "bob"]);

        directory.ingest_member(
            "lounge",
            MemberRecord::Absent {
                username: "alice".into(),
            },
        );
        assert_eq!(directory.members("lounge"), vec!["bob"]);
    }

    #[test]
    fn test_member_before_room_record() {
        // A member mutation can arrive before the room registry entry.
        let mut directory = RoomDirectory::new();
        directory.ingest_member(
            "lounge",
            MemberRecord::Present {
                username: "alice".into(),
            },
        );
        assert_eq!(directory.members("lounge"), vec!["alice"]);

        // The late room record keeps the observed members.
        directory.ingest_room(record("lounge", Visibility::Private));
        let room = directory.get("lounge").unwrap();
        assert_eq!(room.visibility, Visibility::Private);
        assert!(room.members.contains("alice"));
    }

    #[test]
    fn test_room_merge_is_idempotent() {
        let mut directory = RoomDirectory::new();
        directory.ingest_room(record("lounge", Visibility::Public));
        directory.ingest_room(record("lounge", Visibility::Public));
        assert_eq!(directory.public_rooms().len(), 1);
    }

    #[test]
    fn test_public_rooms_filter() {
        let mut directory = RoomDirectory::new();
        directory.ingest_room(record("open", Visibility::Public));
        directory.ingest_room(record("closed", Visibility::Private));

        let names: Vec<String> = directory.public_rooms().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["open"]);
    }

    #[test]
    fn test_my_rooms_includes_placeholder() {
        let mut directory = RoomDirectory::new();
        directory.mark_joined("lounge");

        let names: Vec<String> = directory.my_rooms().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec![GENERAL_ROOM.to_string(), "lounge".to_string()]);

        directory.mark_left("lounge");
        assert!(!directory.is_joined("lounge"));
    }
}
