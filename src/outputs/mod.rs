//! Output writers.
//!
//! - [`json`]: atomically writes the [`Snapshot`](crate::models::Snapshot) to disk

pub mod json;
