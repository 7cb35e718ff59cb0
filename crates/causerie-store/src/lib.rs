//! # causerie-store
//!
//! Local persisted state.  The only thing this client persists outside the
//! replicated graph is the contact directory, kept as one JSON array in the
//! platform data directory and rewritten atomically after every mutation.

pub mod directory;
pub mod models;
pub mod storage;

mod error;

pub use directory::{ContactDirectory, ContactPatch};
pub use error::StoreError;
pub use models::Contact;
pub use storage::ContactStorage;
