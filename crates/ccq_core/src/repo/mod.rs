//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the store contract used by quote and refresh services.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes must call `Book::validate()` before persistence.
//! - "No qualifying paragraph" is `Ok(None)`, never an error.

pub mod book_repo;
