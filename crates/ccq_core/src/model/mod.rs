//! Book/section/paragraph domain model and read projections.
//!
//! # Responsibility
//! - Define the in-memory tree the fetcher builds and the store persists.
//! - Define the citation projections returned by store reads.
//!
//! # Invariants
//! - Identity fields are `None` until the store returns an identified copy.
//! - Paragraphs are plain strings in memory; only storage gives them ids.

pub mod book;
pub mod quote;
