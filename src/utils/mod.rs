//! Utility functions and helpers.

pub mod url;

pub use url::normalize_url;
