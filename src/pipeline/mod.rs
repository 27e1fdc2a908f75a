//! Change detection pipeline.
//!
//! - `fuzzy`: changed-character count between two texts
//! - `classify`: page-level change category
//! - `state`: page state transitions
//! - `scan`: sequential fetch-classify-persist over a batch
//! - `autoscan`: periodic scans of due pages

pub mod autoscan;
pub mod classify;
pub mod content;
pub mod fuzzy;
pub mod scan;
pub mod state;

pub use autoscan::{Autoscanner, is_due};
pub use classify::{Classifier, classify};
pub use fuzzy::{change_magnitude, is_major_change};
pub use scan::{ScanOutcome, ScanReport, Scanner, now_ms};
pub use state::{Transition, transition};
