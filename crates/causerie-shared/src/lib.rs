//! # causerie-shared
//!
//! Types shared across the causerie workspace: message/room identities, the
//! validated wire record shapes, symmetric crypto for the shared channel
//! secret, constants, and the error taxonomy.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod records;
pub mod types;
pub mod util;

pub use error::{ChatError, CryptoError, RecordError, ValidationError};
pub use records::{FileTransfer, MemberRecord, MessageRecord, PresenceRecord, RoomRecord, TypingRecord, Visibility};
pub use types::{now_ms, KeyPair, MessageId, RoomId};
