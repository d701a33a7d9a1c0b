// Adapters layer: concrete implementations of the domain ports for external
// systems (in-memory tables, the remote record API, the local filesystem).

pub mod memory;
pub mod rest;
pub mod storage;

pub use memory::MemoryStore;
pub use rest::RestStore;
pub use storage::LocalStorage;
