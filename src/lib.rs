// src/lib.rs

//! Web page update scanner.
//!
//! Re-fetches tracked pages, classifies each fetch as new content, no change,
//! minor change or major change, and keeps a per-page state that stays
//! `Changed` until the user acknowledges it.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
