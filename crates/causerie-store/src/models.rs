//! Domain model persisted by the contact directory.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A known remote endpoint.  Local-only: contacts never touch the
/// replicated store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Unique contact identifier.
    pub id: Uuid,
    /// Display name chosen by the user.
    pub display_name: String,
    /// Endpoint address used for lookup (e.g. `http://192.168.1.10:8765/gun`).
    pub address: String,
    /// Last time this contact was connected to, epoch millis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<i64>,
    /// Pinned to the top of the sorted view.
    #[serde(default)]
    pub favorite: bool,
}
