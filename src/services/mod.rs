//! Service layer for the scanner.
//!
//! - Page fetching (`PageFetcher`, `HttpFetcher`)

mod fetcher;

pub use fetcher::{FetchRequest, FetchResponse, HttpFetcher, Method, PageFetcher};
