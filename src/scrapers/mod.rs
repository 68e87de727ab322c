//! Turning fetched bytes into pipeline input.
//!
//! | Module | Input | Output |
//! |--------|-------|--------|
//! | [`feed`] | RSS 2.0, RSS 1.0 (RDF) or Atom document | `Vec<RawEntry>` |
//! | [`article`] | article HTML page | readable main-content text |
//!
//! All network I/O goes through [`crate::fetch::FeedFetcher`]; parsing
//! itself is pure.

pub mod article;
pub mod feed;
