//! In-memory reference replica.
//!
//! Reproduces the delivery behavior the reconcilers must tolerate: field-wise
//! merge of object nodes, re-emission of the merged node to every subscriber
//! on each write, full replay of known children to a new subscriber, and
//! null tombstones.  Used by tests and single-process deployments; a real
//! networked store plugs in behind the same [`GraphStore`] trait.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::path::GraphPath;
use crate::store::{GraphEvent, GraphStore, Subscription};

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<GraphEvent>,
}

#[derive(Default)]
struct GraphInner {
    nodes: HashMap<String, BTreeMap<String, Value>>,
    subscribers: HashMap<String, Vec<Subscriber>>,
    next_key: u64,
    next_subscriber: u64,
}

impl GraphInner {
    fn emit(&mut self, path: &str, key: &str, value: &Value) {
        if let Some(subs) = self.subscribers.get_mut(path) {
            subs.retain(|sub| {
                sub.tx
                    .send(GraphEvent {
                        key: key.to_string(),
                        value: value.clone(),
                    })
                    .is_ok()
            });
        }
    }
}

/// A process-local [`GraphStore`].  Cheap to clone; clones share the replica.
#[derive(Clone, Default)]
pub struct MemoryGraph {
    inner: Arc<Mutex<GraphInner>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a child node, mainly for assertions in tests.
    pub fn child(&self, path: &GraphPath, key: &str) -> Option<Value> {
        let inner = self.inner.lock().expect("graph lock");
        inner
            .nodes
            .get(path.as_str())
            .and_then(|children| children.get(key))
            .cloned()
    }
}

/// Field-wise merge: objects accumulate fields, anything else replaces.
fn merge(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(update)) => {
            for (field, value) in update {
                current.insert(field, value);
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

impl GraphStore for MemoryGraph {
    fn put(&self, path: &GraphPath, key: &str, value: Value) {
        let mut inner = self.inner.lock().expect("graph lock");

        let children = inner.nodes.entry(path.as_str().to_string()).or_default();
        let merged = match children.get_mut(key) {
            Some(existing) => {
                merge(existing, value);
                existing.clone()
            }
            None => {
                children.insert(key.to_string(), value.clone());
                value
            }
        };

        trace!(path = %path, key, "graph put");
        inner.emit(path.as_str(), key, &merged);
    }

    fn set(&self, path: &GraphPath, value: Value) -> String {
        let key = {
            let mut inner = self.inner.lock().expect("graph lock");
            inner.next_key += 1;
            format!("k{:08x}", inner.next_key)
        };
        self.put(path, &key, value);
        key
    }

    fn subscribe(&self, path: &GraphPath) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.inner.lock().expect("graph lock");

            // Replay every known child to the new subscriber first.
            if let Some(children) = inner.nodes.get(path.as_str()) {
                for (key, value) in children {
                    let _ = tx.send(GraphEvent {
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }

            inner.next_subscriber += 1;
            let id = inner.next_subscriber;
            inner
                .subscribers
                .entry(path.as_str().to_string())
                .or_default()
                .push(Subscriber { id, tx });
            id
        };

        let weak = Arc::downgrade(&self.inner);
        let path_key = path.as_str().to_string();
        let detach: Box<dyn FnOnce() + Send> = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut inner) = inner.lock() {
                    if let Some(subs) = inner.subscribers.get_mut(&path_key) {
                        subs.retain(|sub| sub.id != id);
                    }
                }
            }
        });

        Subscription::new(rx, Some(detach))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use causerie_shared::RoomId;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_then_subscribe_replays() {
        let graph = MemoryGraph::new();
        let users = path::users();

        graph.put(&users, "alice", json!({ "online": true }));

        let mut sub = graph.subscribe(&users);
        let event = sub.recv().await.unwrap();
        assert_eq!(event.key, "alice");
        assert_eq!(event.value, json!({ "online": true }));
    }

    #[tokio::test]
    async fn test_merge_accumulates_fields_and_reemits() {
        let graph = MemoryGraph::new();
        let users = path::users();
        let mut sub = graph.subscribe(&users);

        graph.put(&users, "alice", json!({ "online": true }));
        graph.put(&users, "alice", json!({ "lastSeen": 42 }));

        let first = sub.recv().await.unwrap();
        assert_eq!(first.value, json!({ "online": true }));

        // Second write re-emits the merged node.
        let second = sub.recv().await.unwrap();
        assert_eq!(second.value, json!({ "online": true, "lastSeen": 42 }));
    }

    #[tokio::test]
    async fn test_null_tombstone_replaces_node() {
        let graph = MemoryGraph::new();
        let members = path::members(&RoomId::new("lounge"));
        let mut sub = graph.subscribe(&members);

        graph.put(&members, "alice", json!("alice"));
        graph.put(&members, "alice", Value::Null);

        assert_eq!(sub.recv().await.unwrap().value, json!("alice"));
        assert_eq!(sub.recv().await.unwrap().value, Value::Null);
        assert_eq!(graph.child(&members, "alice"), Some(Value::Null));
    }

    #[tokio::test]
    async fn test_set_generates_distinct_keys() {
        let graph = MemoryGraph::new();
        let messages = path::messages(&RoomId::general());

        let k1 = graph.set(&messages, json!({ "id": "1" }));
        let k2 = graph.set(&messages, json!({ "id": "2" }));
        assert_ne!(k1, k2);
        assert!(graph.child(&messages, &k1).is_some());
    }

    #[tokio::test]
    async fn test_off_detaches() {
        let graph = MemoryGraph::new();
        let users = path::users();

        let sub = graph.subscribe(&users);
        sub.off();
        graph.put(&users, "alice", json!({ "online": true }));

        // A later subscriber still sees the replica state.
        let mut sub2 = graph.subscribe(&users);
        assert_eq!(sub2.recv().await.unwrap().key, "alice");
    }

    #[tokio::test]
    async fn test_every_write_is_delivered() {
        let graph = MemoryGraph::new();
        let messages = path::messages(&RoomId::general());
        let mut sub = graph.subscribe(&messages);

        let record = json!({ "id": "1-aa", "authorName": "alice", "timestamp": 1 });
        let key = graph.set(&messages, record.clone());
        // Re-putting the same record re-delivers it.
        graph.put(&messages, &key, record.clone());

        assert_eq!(sub.recv().await.unwrap().value, record);
        assert_eq!(sub.recv().await.unwrap().value, record);
    }
}
