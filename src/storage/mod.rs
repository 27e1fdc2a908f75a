//! Storage abstractions for page records and document snapshots.
//!
//! Everything lives in a flat string key-value store:
//!
//! ```text
//! pages              # JSON array of page ids, display order
//! page:{id}          # JSON page record
//! html:old:{id}      # OLD snapshot (change baseline)
//! html:new:{id}      # NEW snapshot (latest fetch)
//! ```
//!
//! Backends only move strings around. `PageStore` owns the schema, and
//! `PersistQueue` performs writes in the background.

pub mod local;
pub mod memory;
pub mod pages;
#[cfg(feature = "s3")]
pub mod s3;
pub mod writer;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::SnapshotSlot;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use pages::PageStore;
#[cfg(feature = "s3")]
pub use s3::S3Storage;
pub use writer::PersistQueue;

/// Key of the ordered page id list.
pub const PAGE_INDEX_KEY: &str = "pages";

pub fn page_key(id: &str) -> String {
    format!("page:{id}")
}

pub fn snapshot_key(id: &str, slot: SnapshotSlot) -> String {
    format!("html:{}:{id}", slot.as_str())
}

/// Trait for key-value storage backends.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Load a value, `None` when the key is absent.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one.
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_schema() {
        assert_eq!(page_key("7"), "page:7");
        assert_eq!(snapshot_key("7", SnapshotSlot::Old), "html:old:7");
        assert_eq!(snapshot_key("7", SnapshotSlot::New), "html:new:7");
    }
}
