//! Store refresh use-case.
//!
//! # Responsibility
//! - Download every configured book, then replace the store content.
//! - Report progress to the caller through `RefreshEvent`s.
//!
//! # Invariants
//! - Fetch-then-commit: the store is untouched unless every book downloaded.
//! - Store failures from `replace_all` are returned unchanged.

use crate::config::BookEntry;
use crate::fetch::{fetch_book, FetchError, SectionSource};
use crate::repo::book_repo::{BookRepository, RepoError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Progress notification emitted during a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    /// Downloading the sections of one book.
    Fetching { title: String, urns: usize },
    /// One book fully downloaded.
    Fetched { title: String, sections: usize },
    /// All books downloaded; writing to the store.
    Saving { books: usize },
    /// Store replaced.
    Completed(RefreshSummary),
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub books: usize,
    pub sections: usize,
    pub paragraphs: usize,
}

/// Refresh failure, split by pipeline stage.
#[derive(Debug)]
pub enum RefreshError {
    /// Download failed; the store was not modified.
    Fetch { title: String, source: FetchError },
    /// Writing failed after the store was cleared.
    Store(RepoError),
}

impl Display for RefreshError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch { title, source } => {
                write!(f, "failed to download book `{title}`: {source}")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RefreshError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch { source, .. } => Some(source),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for RefreshError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Use-case service for the full delete-then-reload refresh.
pub struct RefreshService<S: SectionSource> {
    source: S,
}

impl<S: SectionSource> RefreshService<S> {
    /// Creates a service pulling text from `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Downloads all `entries` and replaces the store content with them.
    ///
    /// `observer` receives progress events in pipeline order.
    pub fn refresh<R, F>(
        &self,
        repo: &mut R,
        entries: &[BookEntry],
        mut observer: F,
    ) -> Result<RefreshSummary, RefreshError>
    where
        R: BookRepository + ?Sized,
        F: FnMut(RefreshEvent),
    {
        let started_at = Instant::now();

        let mut books = Vec::with_capacity(entries.len());
        for entry in entries {
            observer(RefreshEvent::Fetching {
                title: entry.title.clone(),
                urns: entry.urns.len(),
            });

            let book = fetch_book(&self.source, entry).map_err(|source| {
                error!(
                    "event=refresh module=service status=error stage=fetch urn={} error={}",
                    source.urn(),
                    source
                );
                RefreshError::Fetch {
                    title: entry.title.clone(),
                    source,
                }
            })?;

            observer(RefreshEvent::Fetched {
                title: book.title.clone(),
                sections: book.sections.len(),
            });
            books.push(book);
        }

        observer(RefreshEvent::Saving { books: books.len() });
        let saved = repo.replace_all(&books)?;

        let summary = RefreshSummary {
            books: saved.len(),
            sections: saved.iter().map(|book| book.sections.len()).sum(),
            paragraphs: saved.iter().map(|book| book.paragraph_count()).sum(),
        };
        info!(
            "event=refresh module=service status=ok books={} sections={} paragraphs={} duration_ms={}",
            summary.books,
            summary.sections,
            summary.paragraphs,
            started_at.elapsed().as_millis()
        );

        observer(RefreshEvent::Completed(summary));
        Ok(summary)
    }
}
