//! Persistence contract for Service Connections and Sub-Connections
//! (spec §4.5). The database driver is out of scope; this crate defines
//! the contract plus an in-memory reference implementation.

pub mod memory;
pub mod model;
pub mod store;

pub use memory::InMemoryStore;
pub use model::{ServiceConnectionRecord, SubConnectionRecord};
pub use store::ConnectionStore;
