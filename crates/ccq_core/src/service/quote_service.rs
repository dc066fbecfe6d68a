//! Quote selection use-case.
//!
//! # Responsibility
//! - Route a quote request to the title-constrained or unconstrained query.
//! - Package the result as a uniform `Quote`.
//!
//! # Invariants
//! - No state; no fallback when nothing qualifies.
//! - Repository errors are returned unchanged.

use crate::model::quote::Quote;
use crate::repo::book_repo::{BookRepository, RepoResult};

/// Length bound used when the caller gives none.
pub const UNBOUNDED_LENGTH: u32 = u32::MAX;

/// Use-case service choosing a random quote.
pub struct QuoteService<R: BookRepository> {
    repo: R,
}

impl<R: BookRepository> QuoteService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns a random quote, optionally limited to one book and to
    /// paragraphs of at most `max_length` characters.
    ///
    /// # Contract
    /// - With `title`, the returned `book_title` always equals `title`.
    /// - `Ok(None)` when no paragraph qualifies.
    pub fn get_quote(
        &self,
        title: Option<&str>,
        max_length: Option<u32>,
    ) -> RepoResult<Option<Quote>> {
        let max_length = max_length.unwrap_or(UNBOUNDED_LENGTH);
        match title {
            Some(title) => Ok(self
                .repo
                .find_random_paragraph_in_book(title, max_length)?
                .map(|found| found.into_quote(title))),
            None => self.repo.find_random_paragraph(max_length),
        }
    }

    /// Gives the repository back, e.g. to reuse the connection.
    pub fn into_inner(self) -> R {
        self.repo
    }
}
