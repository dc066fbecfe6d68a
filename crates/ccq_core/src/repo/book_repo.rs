//! Book repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist whole `Book -> Section -> paragraph` trees atomically.
//! - Replace the full store content during refresh.
//! - Pick random paragraphs under length/title constraints.
//!
//! # Invariants
//! - One `save` is one transaction: either every row of the book is written
//!   or none is.
//! - Generated section ids are paired with sections by position, never by
//!   value (titles and urns may repeat).
//! - The caller's `Book` is never mutated; `save` returns an identified copy.
//!
//! # Known limits
//! - Random selection is `ORDER BY RANDOM() LIMIT 1`, a full scan over the
//!   qualifying rows. Fine for a few thousand paragraphs.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::book::{Book, BookValidationError, Section, SectionId};
use crate::model::quote::{Quote, SectionQuote};
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const RANDOM_PARAGRAPH_SQL: &str = "SELECT
    b.title,
    s.title,
    p.content
FROM paragraph p
INNER JOIN section s ON s.id = p.section_id
INNER JOIN book b ON b.id = s.book_id
WHERE LENGTH(p.content) <= ?1
ORDER BY RANDOM()
LIMIT 1;";

const RANDOM_PARAGRAPH_IN_BOOK_SQL: &str = "SELECT
    s.title,
    p.content
FROM paragraph p
INNER JOIN section s ON s.id = p.section_id
INNER JOIN book b ON b.id = s.book_id
WHERE b.title = ?2
  AND LENGTH(p.content) <= ?1
ORDER BY RANDOM()
LIMIT 1;";

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("book", &["id", "title"]),
    ("section", &["id", "urn", "title", "book_id"]),
    ("paragraph", &["id", "section_id", "content"]),
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for book persistence and paragraph queries.
#[derive(Debug)]
pub enum RepoError {
    /// The book was rejected before any SQL ran.
    Validation(BookValidationError),
    /// Connectivity or query failure outside a book save.
    Db(DbError),
    /// Saving one book failed; its transaction was rolled back.
    SaveFailed { book_title: String, source: DbError },
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    /// Returns whether this error comes from a violated store constraint
    /// (integrity failure) rather than from connectivity.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Db(err) | Self::SaveFailed { source: err, .. } => err.is_constraint_violation(),
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::SaveFailed { book_title, source } => {
                write!(f, "failed to save book `{book_title}`: {source}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::SaveFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<BookValidationError> for RepoError {
    fn from(value: BookValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Row counts of the three store tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub books: u64,
    pub sections: u64,
    pub paragraphs: u64,
}

/// Store contract for books and random paragraph lookup.
pub trait BookRepository {
    /// Inserts one book tree in a single transaction and returns it with ids.
    fn save(&mut self, book: &Book) -> RepoResult<Book>;
    /// Deletes every book, then saves `books` one transaction per book.
    ///
    /// Every book is validated before anything is deleted. Stops at the first
    /// failing book; books saved before it stay durable.
    fn replace_all(&mut self, books: &[Book]) -> RepoResult<Vec<Book>>;
    /// Deletes every book with its sections and paragraphs.
    fn delete_all(&mut self) -> RepoResult<usize>;
    /// Random paragraph of at most `max_length` characters from any book.
    fn find_random_paragraph(&self, max_length: u32) -> RepoResult<Option<Quote>>;
    /// Random paragraph of at most `max_length` characters from the book
    /// titled exactly `title`.
    fn find_random_paragraph_in_book(
        &self,
        title: &str,
        max_length: u32,
    ) -> RepoResult<Option<SectionQuote>>;
    /// Current row counts.
    fn counts(&self) -> RepoResult<StoreCounts>;
}

/// SQLite-backed book repository.
pub struct SqliteBookRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteBookRepository<'conn> {
    /// Constructs a repository from a connection opened by `db::open_db*`.
    ///
    /// Rejects connections whose schema is missing or from another version,
    /// and turns foreign-key enforcement on for the connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Returns whether at least one book is stored.
    pub fn has_books(&self) -> RepoResult<bool> {
        let exists: i64 =
            self.conn
                .query_row("SELECT EXISTS(SELECT 1 FROM book);", [], |row| row.get(0))?;
        Ok(exists == 1)
    }
}

impl BookRepository for SqliteBookRepository<'_> {
    fn save(&mut self, book: &Book) -> RepoResult<Book> {
        book.validate()?;
        let started_at = Instant::now();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| save_failed(book, err.into()))?;

        let saved = match insert_book_tree(&tx, book) {
            Ok(saved) => saved,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=book_save module=repo status=error error_code=rollback_failed error={}",
                        rollback_err
                    );
                }
                error!(
                    "event=book_save module=repo status=error duration_ms={} error_code=insert_failed constraint={} error={}",
                    started_at.elapsed().as_millis(),
                    err.is_constraint_violation(),
                    err
                );
                return Err(save_failed(book, err));
            }
        };

        tx.commit().map_err(|err| save_failed(book, err.into()))?;

        info!(
            "event=book_save module=repo status=ok book_id={} sections={} paragraphs={} duration_ms={}",
            saved.id.unwrap_or_default(),
            saved.sections.len(),
            saved.paragraph_count(),
            started_at.elapsed().as_millis()
        );
        Ok(saved)
    }

    fn replace_all(&mut self, books: &[Book]) -> RepoResult<Vec<Book>> {
        let started_at = Instant::now();
        for book in books {
            book.validate()?;
        }
        let deleted = self.delete_all()?;

        let mut saved_books = Vec::with_capacity(books.len());
        for (index, book) in books.iter().enumerate() {
            match self.save(book) {
                Ok(saved) => saved_books.push(saved),
                Err(err) => {
                    error!(
                        "event=books_replace module=repo status=error deleted={} saved={} failed_index={} error={}",
                        deleted,
                        saved_books.len(),
                        index,
                        err
                    );
                    return Err(err);
                }
            }
        }

        info!(
            "event=books_replace module=repo status=ok deleted={} saved={} duration_ms={}",
            deleted,
            saved_books.len(),
            started_at.elapsed().as_millis()
        );
        Ok(saved_books)
    }

    fn delete_all(&mut self) -> RepoResult<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM paragraph;", [])?;
        tx.execute("DELETE FROM section;", [])?;
        let deleted = tx.execute("DELETE FROM book;", [])?;
        tx.commit()?;

        info!(
            "event=books_delete module=repo status=ok deleted={}",
            deleted
        );
        Ok(deleted)
    }

    fn find_random_paragraph(&self, max_length: u32) -> RepoResult<Option<Quote>> {
        let quote = self
            .conn
            .query_row(RANDOM_PARAGRAPH_SQL, [i64::from(max_length)], |row| {
                Ok(Quote {
                    book_title: row.get(0)?,
                    section_title: row.get(1)?,
                    text: row.get(2)?,
                })
            })
            .optional()?;

        debug!(
            "event=quote_find module=repo status=ok scope=all max_length={} found={}",
            max_length,
            quote.is_some()
        );
        Ok(quote)
    }

    fn find_random_paragraph_in_book(
        &self,
        title: &str,
        max_length: u32,
    ) -> RepoResult<Option<SectionQuote>> {
        let quote = self
            .conn
            .query_row(
                RANDOM_PARAGRAPH_IN_BOOK_SQL,
                params![i64::from(max_length), title],
                |row| {
                    Ok(SectionQuote {
                        section_title: row.get(0)?,
                        text: row.get(1)?,
                    })
                },
            )
            .optional()?;

        debug!(
            "event=quote_find module=repo status=ok scope=book max_length={} found={}",
            max_length,
            quote.is_some()
        );
        Ok(quote)
    }

    fn counts(&self) -> RepoResult<StoreCounts> {
        let counts = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM book),
                (SELECT COUNT(*) FROM section),
                (SELECT COUNT(*) FROM paragraph);",
            [],
            |row| {
                Ok(StoreCounts {
                    books: row.get(0)?,
                    sections: row.get(1)?,
                    paragraphs: row.get(2)?,
                })
            },
        )?;
        Ok(counts)
    }
}

/// Writes the book row, its section rows and all paragraph rows.
///
/// Runs inside the caller's transaction; the caller commits or rolls back.
fn insert_book_tree(tx: &Transaction<'_>, book: &Book) -> Result<Book, DbError> {
    tx.execute("INSERT INTO book (title) VALUES (?1);", [book.title.as_str()])?;
    let book_id = tx.last_insert_rowid();

    let mut section_ids: Vec<SectionId> = Vec::with_capacity(book.sections.len());
    {
        let mut stmt =
            tx.prepare_cached("INSERT INTO section (urn, title, book_id) VALUES (?1, ?2, ?3);")?;
        for section in &book.sections {
            section_ids.push(stmt.insert(params![
                section.urn.as_str(),
                section.title.as_str(),
                book_id
            ])?);
        }
    }

    {
        let mut stmt =
            tx.prepare_cached("INSERT INTO paragraph (section_id, content) VALUES (?1, ?2);")?;
        for (section, section_id) in book.sections.iter().zip(&section_ids) {
            for paragraph in &section.paragraphs {
                stmt.execute(params![section_id, paragraph.as_str()])?;
            }
        }
    }

    let sections = book
        .sections
        .iter()
        .zip(section_ids)
        .map(|(section, section_id)| Section {
            id: Some(section_id),
            ..section.clone()
        })
        .collect();

    Ok(Book {
        id: Some(book_id),
        title: book.title.clone(),
        sections,
    })
}

fn save_failed(book: &Book, source: DbError) -> RepoError {
    RepoError::SaveFailed {
        book_title: book.title.clone(),
        source,
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
