//! Remote store seam: trait contract plus the shipped implementations

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use traits::{
    BackendError, BackendResult, CreatePool, CreatePoolReceipt, GroupKind, InventoryBackend,
};
