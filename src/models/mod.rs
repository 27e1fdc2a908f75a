// src/models/mod.rs

//! Domain models for the scanner.

mod change;
mod config;
mod page;

// Re-export all public types
pub use change::{ChangeCategory, SnapshotSlot};
pub use config::{
    AutoscanConfig, Config, LoggingConfig, PageDefaults, ScannerConfig, StorageBackend,
    StorageConfig,
};
pub use page::{Page, PageState, ScanError};
