//! The replicated-graph-store capability.
//!
//! The actual store (its merge algorithm, wire protocol and persistence) is
//! an external collaborator; this trait is the whole surface the session
//! layer consumes.  Subscriptions deliver raw child mutations over a channel:
//! once per observed write, including re-deliveries, with an initial replay
//! of already-known children on attach.  No ordering and no deduplication is
//! promised — that is the reconcilers' job.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::path::GraphPath;

/// One observed child mutation under a subscribed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEvent {
    /// The child key (e.g. a username, a room name, or a generated set key).
    pub key: String,
    /// The child node's current value as seen by the local replica.  May be
    /// a partial snapshot of a node still being assembled, or `null` for a
    /// tombstoned slot.
    pub value: Value,
}

/// A live feed of child mutations.  Dropping it (or calling [`off`]) detaches
/// the callback from the feed; work already scheduled completes and its
/// results are discarded.
///
/// [`off`]: Subscription::off
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<GraphEvent>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<GraphEvent>,
        detach: Option<Box<dyn FnOnce() + Send>>,
    ) -> Self {
        Self { rx, detach }
    }

    /// Receive the next mutation; `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<GraphEvent> {
        self.rx.recv().await
    }

    /// Detach from the feed.
    pub fn off(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// Merge-writing, appending and subscribing on the replicated graph.
pub trait GraphStore: Send + Sync {
    /// Merge-write the child `key` under `path`.  Object values merge
    /// field-wise into the existing node; `null` tombstones the slot.
    fn put(&self, path: &GraphPath, key: &str, value: Value);

    /// Append `value` under `path` with a store-generated key, which is
    /// returned.
    fn set(&self, path: &GraphPath, value: Value) -> String;

    /// Subscribe to every child mutation under `path`.  Already-known
    /// children are replayed to the new subscriber before live writes.
    fn subscribe(&self, path: &GraphPath) -> Subscription;
}
