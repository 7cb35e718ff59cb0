//! Typing indicators.
//!
//! A presence-like flag per room per user.  There is no timeout: the state is
//! explicitly cleared by the sender, not aged out.

use std::collections::{BTreeMap, HashMap};

use causerie_shared::RoomId;

#[derive(Debug, Default)]
pub struct TypingTracker {
    rooms: HashMap<RoomId, BTreeMap<String, bool>>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest written flag for a user.
    pub fn set(&mut self, room: &RoomId, username: &str, typing: bool) {
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(username.to_string(), typing);
    }

    /// Users whose latest flag is `true`, in name order.
    pub fn typing_users(&self, room: &RoomId) -> Vec<String> {
        self.rooms
            .get(room)
            .map(|users| {
                users
                    .iter()
                    .filter(|(_, &typing)| typing)
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let room = RoomId::general();
        let mut tracker = TypingTracker::new();

        tracker.set(&room, "alice", true);
        tracker.set(&room, "bob", true);
        assert_eq!(tracker.typing_users(&room), vec!["alice", "bob"]);

        tracker.set(&room, "alice", false);
        assert_eq!(tracker.typing_users(&room), vec!["bob"]);
    }

    #[test]
    fn test_rooms_are_independent() {
        let general = RoomId::general();
        let lounge = RoomId::new("lounge");
        let mut tracker = TypingTracker::new();

        tracker.set(&general, "alice", true);
        assert!(tracker.typing_users(&lounge).is_empty());
        assert_eq!(tracker.typing_users(&general), vec!["alice"]);
    }

    #[test]
    fn test_latest_write_wins() {
        let room = RoomId::general();
        let mut tracker = TypingTracker::new();

        tracker.set(&room, "alice", false);
        tracker.set(&room, "alice", true);
        assert_eq!(tracker.typing_users(&room), vec!["alice"]);
    }
}
