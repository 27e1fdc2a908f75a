// src/pipeline/autoscan.rs

//! Periodic scanning of pages whose scan rate has elapsed.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::models::{AutoscanConfig, Page};
use crate::pipeline::scan::{ScanReport, Scanner, now_ms};

const MINUTE_MS: i64 = 60_000;

/// Whether a page should be picked up by the autoscan at `now_ms`.
///
/// A scan rate of zero means manual scans only.
pub fn is_due(page: &Page, now_ms: i64) -> bool {
    if page.scan_rate_minutes == 0 {
        return false;
    }
    match page.last_autoscan_time {
        None => true,
        Some(last) => now_ms.saturating_sub(last) >= i64::from(page.scan_rate_minutes) * MINUTE_MS,
    }
}

pub struct Autoscanner {
    scanner: Scanner,
    poll_interval: Duration,
}

impl Autoscanner {
    pub fn new(scanner: Scanner, config: &AutoscanConfig) -> Self {
        Self {
            scanner,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn into_scanner(self) -> Scanner {
        self.scanner
    }

    /// Scan every due page once, in index order.
    pub async fn run_once(&self, now_ms: i64) -> Result<ScanReport> {
        // Records written by the previous batch must be visible before reloading.
        self.scanner.flush().await;

        let mut due: Vec<Page> = self
            .scanner
            .pages()
            .load_all()
            .await?
            .into_iter()
            .filter(|page| is_due(page, now_ms))
            .collect();

        if due.is_empty() {
            log::debug!("Autoscan: nothing due");
            return Ok(ScanReport::default());
        }

        log::info!("Autoscan: {} pages due", due.len());
        for page in &mut due {
            page.last_autoscan_time = Some(now_ms);
        }
        Ok(self.scanner.scan_all(&mut due).await)
    }

    /// Poll until `shutdown` resolves. A running batch is always finished first.
    pub async fn run_forever<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Autoscan stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.run_once(now_ms()).await {
                        Ok(report) if !report.newly_changed.is_empty() => {
                            log::info!("Changed pages: {}", report.newly_changed.join(", "));
                        }
                        Ok(_) => {}
                        Err(e) => log::error!("Autoscan pass failed: {}", e),
                    }
                    self.scanner.flush().await;
                }
            }
        }
    }
}
