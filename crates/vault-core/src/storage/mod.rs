//! Storage backends for vault persistence
//!
//! The vault only needs a key-value byte store. Two backends:
//! 1. JSON file in the user's data directory
//! 2. In-memory map (tests and ephemeral vaults)

mod file;
mod memory;
mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::KeyValueStore;
