//! Book and section entities.
//!
//! # Responsibility
//! - Hold fetched text as `Book -> Section -> paragraph` values.
//! - Validate the tree before it reaches SQL.
//!
//! # Invariants
//! - `Book::id` and `Section::id` are store-assigned; callers never set them.
//! - A book title is never blank.
//! - Paragraph text never contains NUL; SQLite `LENGTH()` stops counting there.
//! - Section order is preserved exactly as submitted.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned identity of a `book` row.
pub type BookId = i64;

/// Store-assigned identity of a `section` row.
pub type SectionId = i64;

/// A titled collection of sections; the unit of refresh and delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// `None` until persisted.
    pub id: Option<BookId>,
    pub title: String,
    pub sections: Vec<Section>,
}

/// A titled subdivision of a book, sourced from one remote urn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// `None` until persisted.
    pub id: Option<SectionId>,
    /// Remote source identifier; not unique in storage.
    pub urn: String,
    pub title: String,
    /// Plain-text paragraphs in source order. May be empty.
    pub paragraphs: Vec<String>,
}

/// Validation failures detected before any row is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookValidationError {
    BlankTitle,
    /// The book itself is unsaved but one of its sections carries an id.
    SectionAlreadyIdentified { index: usize, id: SectionId },
    NulInParagraph { section: usize, paragraph: usize },
}

impl Display for BookValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "book title must not be blank"),
            Self::SectionAlreadyIdentified { index, id } => write!(
                f,
                "section #{index} already has id {id} but its book is unsaved"
            ),
            Self::NulInParagraph { section, paragraph } => write!(
                f,
                "paragraph #{paragraph} of section #{section} contains a NUL character"
            ),
        }
    }
}

impl Error for BookValidationError {}

impl Book {
    /// Creates an unsaved book.
    pub fn new(title: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            id: None,
            title: title.into(),
            sections,
        }
    }

    /// Checks the invariants the store relies on.
    pub fn validate(&self) -> Result<(), BookValidationError> {
        if self.title.trim().is_empty() {
            return Err(BookValidationError::BlankTitle);
        }

        if self.id.is_none() {
            if let Some((index, id)) = self
                .sections
                .iter()
                .enumerate()
                .find_map(|(index, section)| section.id.map(|id| (index, id)))
            {
                return Err(BookValidationError::SectionAlreadyIdentified { index, id });
            }
        }

        for (section_index, section) in self.sections.iter().enumerate() {
            if let Some(paragraph_index) = section
                .paragraphs
                .iter()
                .position(|paragraph| paragraph.contains('\0'))
            {
                return Err(BookValidationError::NulInParagraph {
                    section: section_index,
                    paragraph: paragraph_index,
                });
            }
        }

        Ok(())
    }

    /// Returns whether the store has assigned an id to this book.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Identity comparison for persisted books.
    ///
    /// Unsaved books never share identity; compare them with `==` instead.
    pub fn same_identity(&self, other: &Book) -> bool {
        matches!((self.id, other.id), (Some(left), Some(right)) if left == right)
    }

    /// Total number of paragraphs across all sections.
    pub fn paragraph_count(&self) -> usize {
        self.sections
            .iter()
            .map(|section| section.paragraphs.len())
            .sum()
    }
}

impl Section {
    /// Creates an unsaved section.
    pub fn new(urn: impl Into<String>, title: impl Into<String>, paragraphs: Vec<String>) -> Self {
        Self {
            id: None,
            urn: urn.into(),
            title: title.into(),
            paragraphs,
        }
    }
}
