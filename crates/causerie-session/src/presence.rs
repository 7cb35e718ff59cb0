//! Presence reconciliation.
//!
//! Presence is a last-write-wins projection per user, not an append-only
//! log, so ingestion is a plain overwrite by username.  A peer that stops
//! heartbeating without ever writing `online: false` ages out of the online
//! view once its last-seen timestamp exceeds the presence timeout; the
//! record itself is never deleted.

use std::collections::HashMap;

use causerie_shared::constants::PRESENCE_TIMEOUT_MS;
use causerie_shared::PresenceRecord;

#[derive(Debug, Default)]
pub struct PresenceTracker {
    records: HashMap<String, PresenceRecord>,
    version: u64,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite-by-username merge.
    pub fn ingest(&mut self, record: PresenceRecord) {
        self.records.insert(record.username.clone(), record);
        self.version += 1;
    }

    /// Flip a user's record to offline without touching its other fields.
    /// Used for the local optimistic application of a logout.
    pub fn mark_offline(&mut self, username: &str, now: i64) {
        if let Some(record) = self.records.get_mut(username) {
            record.online = false;
            record.last_seen = now;
            self.version += 1;
        }
    }

    /// Bump the projection version without changing any record.  The
    /// liveness tick calls this so the online view is re-evaluated against
    /// the wall clock even when no write arrived.
    pub fn touch(&mut self) {
        self.version += 1;
    }

    /// Monotonic change counter, incremented on every ingest and tick.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, username: &str) -> Option<&PresenceRecord> {
        self.records.get(username)
    }

    /// Users considered effectively online at `now`: flagged online and seen
    /// within the presence timeout.  Name-ordered for determinism.
    pub fn online_users(&self, now: i64) -> Vec<PresenceRecord> {
        let mut online: Vec<PresenceRecord> = self
            .records
            .values()
            .filter(|record| record.online && now - record.last_seen < PRESENCE_TIMEOUT_MS)
            .cloned()
            .collect();
        online.sort_by(|a, b| a.username.cmp(&b.username));
        online
    }

    pub fn online_count(&self, now: i64) -> usize {
        self.records
            .values()
            .filter(|record| record.online && now - record.last_seen < PRESENCE_TIMEOUT_MS)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(username: &str, online: bool, last_seen: i64) -> PresenceRecord {
        PresenceRecord {
            username: username.to_string(),
            online,
            last_seen,
            public_key: None,
        }
    }

    #[test]
    fn test_timeout_boundaries() {
        let now = 1_700_000_000_000;
        let mut tracker = PresenceTracker::new();

        // 59s ago: included.  61s ago: excluded despite online=true.
        tracker.ingest(record("fresh", true, now - 59_000));
        tracker.ingest(record("stale", true, now - 61_000));

        let online = tracker.online_users(now);
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].username, "fresh");
        assert_eq!(tracker.online_count(now), 1);

        // The stale record is aged out of the view, not deleted.
        assert!(tracker.get("stale").is_some());
    }

    #[test]
    fn test_offline_flag_excludes() {
        let now = 1_700_000_000_000;
        let mut tracker = PresenceTracker::new();

        tracker.ingest(record("gone", false, now));
        assert!(tracker.online_users(now).is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let now = 1_700_000_000_000;
        let mut tracker = PresenceTracker::new();

        tracker.ingest(record("alice", true, now - 90_000));
        tracker.ingest(record("alice", true, now));

        assert_eq!(tracker.online_count(now), 1);
        assert_eq!(tracker.get("alice").unwrap().last_seen, now);
    }

    #[test]
    fn test_mark_offline_preserves_key() {
        let now = 1_700_000_000_000;
        let mut tracker = PresenceTracker::new();

        let mut rec = record("alice", true, now);
        rec.public_key = Some("abcd".to_string());
        tracker.ingest(rec);

        tracker.mark_offline("alice", now);
        let alice = tracker.get("alice").unwrap();
        assert!(!alice.online);
        assert_eq!(alice.public_key.as_deref(), Some("abcd"));
    }

    #[test]
    fn test_version_bumps_on_touch() {
        let mut tracker = PresenceTracker::new();
        let before = tracker.version();
        tracker.touch();
        assert_eq!(tracker.version(), before + 1);
    }
}
