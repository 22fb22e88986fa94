//! `ranksync-cache` — file-backed snapshots of rank rows taken at ban time.
//!
//! The whole collection lives in one pretty-printed JSON array. Every
//! mutation loads it, applies the change and atomically rewrites the file,
//! serialised by an in-process lock.

pub mod error;
pub mod store;

pub use error::{CacheError, Result};
pub use store::CacheStore;
