//! # causerie-session
//!
//! The client-side reconciliation and session layer: converts the replicated
//! store's raw, unordered, possibly-duplicated mutation stream into
//! application state (messages, presence, rooms, typing, file transfers,
//! connection health) and encodes outgoing actions back into graph
//! mutations.
//!
//! The entry point is [`Session`]: construct it over a [`GraphStore`],
//! `start()` it inside a tokio runtime, drain [`SessionEvent`]s, and read
//! the projections through its accessors.
//!
//! [`GraphStore`]: causerie_graph::GraphStore

pub mod connection;
pub mod events;
pub mod files;
pub mod messages;
pub mod presence;
pub mod rooms;
pub mod session;
pub mod telemetry;
pub mod typing;

mod feed;

pub use connection::{reconnect_delay, ConnectionPhase, ConnectionState, ConnectionSupervisor};
pub use events::{SessionEvent, TransferDirection};
pub use files::{DownloadedFile, FileInput, FileTransferPipeline};
pub use messages::{Message, MessageLog};
pub use presence::PresenceTracker;
pub use rooms::{Room, RoomDirectory};
pub use session::{Session, SessionConfig};
pub use telemetry::init_tracing;
pub use typing::TypingTracker;
