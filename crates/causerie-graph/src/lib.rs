// Boundary to the replicated graph store: typed paths, the capability trait,
// and an in-memory reference replica with the store's delivery semantics.

pub mod memory;
pub mod path;
pub mod store;

pub use memory::MemoryGraph;
pub use path::GraphPath;
pub use store::{GraphEvent, GraphStore, Subscription};
