//! Background persistence.
//!
//! Scans hand their writes to a single worker task and move on to the next
//! page without waiting. The worker applies writes in the order they were
//! queued, so writes to the same key never reorder. A failed write is logged
//! and dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::models::{Page, SnapshotSlot};
use crate::storage::{KeyValueStore, page_key, snapshot_key};

enum Command {
    Save { key: String, value: String },
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget write queue backed by one worker task.
pub struct PersistQueue {
    tx: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
}

impl PersistQueue {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        let worker = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Save { key, value } => {
                        if let Err(e) = store.save(&key, &value).await {
                            log::error!("Background write of {} failed: {}", key, e);
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx, worker }
    }

    fn enqueue(&self, key: String, value: String) {
        if self.tx.send(Command::Save { key, value }).is_err() {
            log::error!("Persistence worker is gone, dropping write");
        }
    }

    /// Queue a page record write.
    pub fn save_page(&self, page: &Page) {
        match serde_json::to_string(page) {
            Ok(json) => self.enqueue(page_key(&page.id), json),
            Err(e) => log::error!("Failed to serialize page {}: {}", page.id, e),
        }
    }

    /// Queue a snapshot write.
    pub fn save_snapshot(&self, id: &str, slot: SnapshotSlot, content: String) {
        self.enqueue(snapshot_key(id, slot), content);
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }

    /// Drain outstanding writes and stop the worker.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            log::error!("Persistence worker panicked: {}", e);
        }
    }
}
