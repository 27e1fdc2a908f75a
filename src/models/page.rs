//! Tracked page record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{ChangeCategory, PageDefaults};
use crate::pipeline::state::{self, Transition};

/// Scan state of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    #[default]
    NoChange,
    Changed,
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageState::NoChange => f.write_str("no_change"),
            PageState::Changed => f.write_str("changed"),
        }
    }
}

/// Failure recorded by the last scan attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    /// Human-readable description
    pub message: String,
    /// Epoch milliseconds of the failed attempt
    pub time: i64,
}

/// A monitored web page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Opaque identifier, unique per store
    pub id: String,

    /// Display title
    pub title: String,

    /// Address to fetch
    pub url: String,

    /// Minutes between autoscans (0 = manual only)
    pub scan_rate_minutes: u32,

    /// Minimum changed characters that count as a major change
    pub change_threshold: u32,

    /// Ignore changes that only touch digits
    pub ignore_numbers: bool,

    /// Charset label used to decode responses, or "auto"
    pub encoding: String,

    pub highlight_changes: bool,
    pub highlight_colour: String,
    pub mark_changes: bool,

    /// Send a POST with `post_params` instead of a GET
    pub do_post: bool,
    pub post_params: String,

    #[serde(default)]
    pub state: PageState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScanError>,

    #[serde(default)]
    pub last_autoscan_time: Option<i64>,

    /// Fetch time of the OLD snapshot
    #[serde(default)]
    pub old_scan_time: Option<i64>,

    /// Fetch time of the NEW snapshot
    #[serde(default)]
    pub new_scan_time: Option<i64>,
}

impl Page {
    /// Create a page with the configured defaults.
    pub fn new(id: impl Into<String>, url: impl Into<String>, defaults: &PageDefaults) -> Self {
        let url = url.into();
        Self {
            id: id.into(),
            title: url.clone(),
            url,
            scan_rate_minutes: defaults.scan_rate_minutes,
            change_threshold: defaults.change_threshold,
            ignore_numbers: defaults.ignore_numbers,
            encoding: defaults.encoding.clone(),
            highlight_changes: defaults.highlight_changes,
            highlight_colour: defaults.highlight_colour.clone(),
            mark_changes: defaults.mark_changes,
            do_post: false,
            post_params: String::new(),
            state: PageState::NoChange,
            error: None,
            last_autoscan_time: None,
            old_scan_time: None,
            new_scan_time: None,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.state == PageState::Changed
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Message of the last failed scan, empty when the last scan succeeded.
    pub fn error_message(&self) -> &str {
        self.error.as_ref().map_or("", |e| e.message.as_str())
    }

    /// Apply a successful scan's classification.
    ///
    /// Returns the transition so the caller can perform the snapshot writes.
    pub fn apply_scan(&mut self, category: ChangeCategory, now: i64) -> Transition {
        let transition = state::transition(self.state, category);

        if transition.promote_baseline {
            self.old_scan_time = self.new_scan_time;
        }
        if transition.write_new {
            self.new_scan_time = Some(now);
        }
        self.state = transition.next;
        self.error = None;

        transition
    }

    /// Record a failed scan. State and scan times are left untouched.
    pub fn record_failure(&mut self, message: impl Into<String>, now: i64) {
        self.error = Some(ScanError {
            message: message.into(),
            time: now,
        });
    }

    /// User acknowledgment: the only way out of `Changed`.
    pub fn acknowledge(&mut self) {
        self.state = PageState::NoChange;
    }
}
