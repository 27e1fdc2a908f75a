//! Page records and snapshots on top of a key-value store.
//!
//! Saves and deletes are best-effort: failures are logged and the call
//! still returns normally. Loads report their errors.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Page, PageDefaults, SnapshotSlot};
use crate::storage::{KeyValueStore, PAGE_INDEX_KEY, page_key, snapshot_key};

/// Typed access to pages and their snapshots.
#[derive(Clone)]
pub struct PageStore {
    store: Arc<dyn KeyValueStore>,
}

impl PageStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The underlying key-value store.
    pub fn backend(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    /// Page ids in display order.
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        match self.store.load(PAGE_INDEX_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn load_page(&self, id: &str) -> Result<Option<Page>> {
        match self.store.load(&page_key(id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Load a page or fail with `NotFound`.
    pub async fn require_page(&self, id: &str) -> Result<Page> {
        self.load_page(id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Load every indexed page in order. Unreadable records are skipped.
    pub async fn load_all(&self) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        for id in self.list_ids().await? {
            match self.load_page(&id).await {
                Ok(Some(page)) => pages.push(page),
                Ok(None) => log::warn!("Page {} is indexed but has no record", id),
                Err(e) => log::error!("Failed to load page {}: {}", id, e),
            }
        }
        Ok(pages)
    }

    /// Track a new URL. The id is the next free integer.
    pub async fn create_page(&self, url: &str, defaults: &PageDefaults) -> Result<Page> {
        let mut ids = self.list_ids().await?;
        let next = ids
            .iter()
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);

        let page = Page::new(next.to_string(), url, defaults);
        self.save_page(&page).await;

        ids.push(page.id.clone());
        self.save_index(&ids).await;

        log::info!("Tracking page {} ({})", page.id, page.url);
        Ok(page)
    }

    pub async fn save_page(&self, page: &Page) {
        let result = match serde_json::to_string(page) {
            Ok(json) => self.store.save(&page_key(&page.id), &json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            log::error!("Failed to save page {}: {}", page.id, e);
        }
    }

    async fn save_index(&self, ids: &[String]) {
        let result = match serde_json::to_string(ids) {
            Ok(json) => self.store.save(PAGE_INDEX_KEY, &json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            log::error!("Failed to save page index: {}", e);
        }
    }

    /// Stop tracking a page and drop its snapshots.
    pub async fn delete_page(&self, id: &str) {
        for slot in [SnapshotSlot::Old, SnapshotSlot::New] {
            if let Err(e) = self.store.remove(&snapshot_key(id, slot)).await {
                log::error!("Failed to remove {} snapshot of {}: {}", slot.as_str(), id, e);
            }
        }
        if let Err(e) = self.store.remove(&page_key(id)).await {
            log::error!("Failed to remove page {}: {}", id, e);
        }

        match self.list_ids().await {
            Ok(mut ids) => {
                ids.retain(|existing| existing != id);
                self.save_index(&ids).await;
            }
            Err(e) => log::error!("Failed to update page index after removing {}: {}", id, e),
        }
        log::info!("Stopped tracking page {}", id);
    }

    pub async fn load_snapshot(&self, id: &str, slot: SnapshotSlot) -> Result<Option<String>> {
        self.store.load(&snapshot_key(id, slot)).await
    }

    pub async fn save_snapshot(&self, id: &str, slot: SnapshotSlot, content: &str) {
        if let Err(e) = self.store.save(&snapshot_key(id, slot), content).await {
            log::error!("Failed to save {} snapshot of {}: {}", slot.as_str(), id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalStorage, MemoryStorage};
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn memory_store() -> PageStore {
        PageStore::new(Arc::new(MemoryStorage::new()))
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    #[async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn load(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn save(&self, key: &str, _value: &str) -> Result<()> {
            Err(AppError::storage(format!("read-only: {key}")))
        }
        async fn remove(&self, key: &str) -> Result<()> {
            Err(AppError::storage(format!("read-only: {key}")))
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = memory_store();
        let defaults = PageDefaults::default();

        let first = store.create_page("https://a.example/", &defaults).await.unwrap();
        let second = store.create_page("https://b.example/", &defaults).await.unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");
        assert_eq!(store.list_ids().await.unwrap(), vec!["1", "2"]);

        store.delete_page("1").await;
        let third = store.create_page("https://c.example/", &defaults).await.unwrap();
        assert_eq!(third.id, "3");
    }

    #[tokio::test]
    async fn test_load_all_keeps_index_order() {
        let store = memory_store();
        let defaults = PageDefaults::default();
        for url in ["https://a.example/", "https://b.example/", "https://c.example/"] {
            store.create_page(url, &defaults).await.unwrap();
        }

        let urls: Vec<String> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();
        assert_eq!(
            urls,
            vec!["https://a.example/", "https://b.example/", "https://c.example/"]
        );
    }

    #[tokio::test]
    async fn test_delete_removes_snapshots() {
        let tmp = TempDir::new().unwrap();
        let store = PageStore::new(Arc::new(LocalStorage::new(tmp.path())));
        let page = store
            .create_page("https://a.example/", &PageDefaults::default())
            .await
            .unwrap();

        store.save_snapshot(&page.id, SnapshotSlot::Old, "before").await;
        store.save_snapshot(&page.id, SnapshotSlot::New, "after").await;
        assert_eq!(
            store
                .load_snapshot(&page.id, SnapshotSlot::Old)
                .await
                .unwrap()
                .as_deref(),
            Some("before")
        );

        store.delete_page(&page.id).await;
        assert!(store.load_page(&page.id).await.unwrap().is_none());
        assert!(
            store
                .load_snapshot(&page.id, SnapshotSlot::New)
                .await
                .unwrap()
                .is_none()
        );
        assert!(store.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_require_missing_page() {
        let store = memory_store();
        assert!(matches!(
            store.require_page("42").await,
            Err(AppError::NotFound(id)) if id == "42"
        ));
    }

    #[tokio::test]
    async fn test_write_failures_are_swallowed() {
        let store = PageStore::new(Arc::new(ReadOnlyStore));
        let page = store
            .create_page("https://a.example/", &PageDefaults::default())
            .await
            .unwrap();

        store.save_page(&page).await;
        store.save_snapshot(&page.id, SnapshotSlot::New, "body").await;
        store.delete_page(&page.id).await;
    }
}
