// src/pipeline/scan.rs

//! Sequential scan of an ordered list of pages.
//!
//! Each page is fetched, classified against its NEW snapshot, moved through
//! the state machine and handed to the persistence queue before the next
//! page's fetch starts. A failing page is marked and skipped, never fatal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{ChangeCategory, Page, ScannerConfig, SnapshotSlot};
use crate::pipeline::classify::Classifier;
use crate::services::{FetchRequest, PageFetcher};
use crate::storage::{PageStore, PersistQueue};

/// Result of scanning one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Classified(ChangeCategory),
    Failed(String),
}

/// Summary of one batch, outcomes in scan order.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub outcomes: Vec<(String, ScanOutcome)>,
    /// Pages that moved into `Changed` during this batch
    pub newly_changed: Vec<String>,
}

impl ScanReport {
    pub fn count(&self, category: ChangeCategory) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == ScanOutcome::Classified(category))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ScanOutcome::Failed(_)))
            .count()
    }

    pub fn scanned(&self) -> usize {
        self.outcomes.len()
    }

    pub fn outcome(&self, id: &str) -> Option<&ScanOutcome> {
        self.outcomes
            .iter()
            .find(|(page_id, _)| page_id == id)
            .map(|(_, outcome)| outcome)
    }
}

/// NEW snapshots queued for writing but possibly not yet in the store.
///
/// Entries carry the sequence number of their write so a flush only evicts
/// what it actually covered.
#[derive(Default)]
struct PendingSnapshots {
    next_seq: u64,
    entries: HashMap<String, (u64, String)>,
}

/// Drives fetch, classification and persistence for a batch of pages.
pub struct Scanner {
    fetcher: Arc<dyn PageFetcher>,
    pages: PageStore,
    queue: PersistQueue,
    config: ScannerConfig,
    pending: Mutex<PendingSnapshots>,
}

impl Scanner {
    /// Must be called inside a tokio runtime (the persistence worker is spawned here).
    pub fn new(fetcher: Arc<dyn PageFetcher>, pages: PageStore, config: ScannerConfig) -> Self {
        let queue = PersistQueue::spawn(pages.backend());
        Self {
            fetcher,
            pages,
            queue,
            config,
            pending: Mutex::new(PendingSnapshots::default()),
        }
    }

    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    /// Wait for every write queued so far.
    pub async fn flush(&self) {
        let covered = self.lock_pending().next_seq;
        self.queue.flush().await;
        self.lock_pending()
            .entries
            .retain(|_, (seq, _)| *seq >= covered);
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, PendingSnapshots> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest NEW snapshot of a page, including writes still in the queue.
    async fn load_baseline(&self, id: &str) -> Result<String> {
        let queued = self
            .lock_pending()
            .entries
            .get(id)
            .map(|(_, body)| body.clone());
        match queued {
            Some(body) => Ok(body),
            None => Ok(self
                .pages
                .load_snapshot(id, SnapshotSlot::New)
                .await?
                .unwrap_or_default()),
        }
    }

    fn queue_new_snapshot(&self, id: &str, body: String) {
        {
            let mut pending = self.lock_pending();
            let seq = pending.next_seq;
            pending.next_seq += 1;
            pending.entries.insert(id.to_string(), (seq, body.clone()));
        }
        self.queue.save_snapshot(id, SnapshotSlot::New, body);
    }

    /// Drain queued writes and stop the persistence worker.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }

    /// Scan pages strictly in order. Returns once every page has been attempted.
    ///
    /// Writes are queued, not awaited; call [`Scanner::flush`] when they must
    /// be durable.
    pub async fn scan_all(&self, pages: &mut [Page]) -> ScanReport {
        let delay = Duration::from_millis(self.config.request_delay_ms);
        let mut report = ScanReport::default();

        let mut scanned: HashMap<String, Page> = HashMap::new();

        for (index, page) in pages.iter_mut().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // A page listed twice continues from its first scan.
            if let Some(earlier) = scanned.get(&page.id) {
                *page = earlier.clone();
            }

            let was_changed = page.is_changed();
            let outcome = match self.scan_page(page).await {
                Ok(category) => {
                    log::info!("Page {} ({}): {}", page.id, page.url, category);
                    ScanOutcome::Classified(category)
                }
                Err(e) => {
                    log::warn!("Scan of page {} ({}) failed: {}", page.id, page.url, e);
                    let message = e.to_string();
                    page.record_failure(message.clone(), now_ms());
                    ScanOutcome::Failed(message)
                }
            };
            self.queue.save_page(page);

            if !was_changed && page.is_changed() {
                report.newly_changed.push(page.id.clone());
            }
            report.outcomes.push((page.id.clone(), outcome));
            scanned.insert(page.id.clone(), page.clone());
        }

        log::info!(
            "Scanned {} pages: {} changed, {} failed",
            report.scanned(),
            report.newly_changed.len(),
            report.failures()
        );
        report
    }

    async fn scan_page(&self, page: &mut Page) -> Result<ChangeCategory> {
        let request = FetchRequest::for_page(page);
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_success() {
            return Err(AppError::Status {
                url: request.url,
                status: response.status,
            });
        }

        // The comparison baseline is the previous NEW, not OLD.
        let baseline = self.load_baseline(&page.id).await?;

        let category = Classifier::for_page(page, self.config.compare_text_only)
            .classify(&baseline, &response.body);
        let transition = page.apply_scan(category, now_ms());

        if transition.promote_baseline {
            self.queue
                .save_snapshot(&page.id, SnapshotSlot::Old, baseline);
        }
        if transition.write_new {
            self.queue_new_snapshot(&page.id, response.body);
        }

        Ok(category)
    }
}

/// Current time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
