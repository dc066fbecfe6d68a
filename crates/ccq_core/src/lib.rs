//! Core logic for ccq, the classical Chinese quote tool.
//! Owns the book store, quote selection and the refresh pipeline.

pub mod config;
pub mod db;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{BookEntry, ConfigError, Configuration, DatabaseConfig};
pub use fetch::{FetchError, FetchedSection, HttpSectionSource, SectionSource};
pub use logging::{default_log_level, flush_logs, init_logging, logging_status};
pub use model::book::{Book, BookId, BookValidationError, Section, SectionId};
pub use model::quote::{Quote, SectionQuote};
pub use repo::book_repo::{
    BookRepository, RepoError, RepoResult, SqliteBookRepository, StoreCounts,
};
pub use service::quote_service::QuoteService;
pub use service::refresh_service::{RefreshError, RefreshEvent, RefreshService, RefreshSummary};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
