//! Remote text retrieval.
//!
//! # Responsibility
//! - Define the `SectionSource` seam the refresh pipeline pulls text from.
//! - Assemble fetched sections into unsaved `Book` trees.
//!
//! # Invariants
//! - One section per urn, in configuration order.
//! - A failed urn fails the whole book; nothing partial is returned.
//! - NUL characters are dropped from fetched paragraphs.

use crate::config::BookEntry;
use crate::model::book::{Book, Section};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod http;

pub use http::{parse_section_body, HttpSectionSource};

pub type FetchResult<T> = Result<T, FetchError>;

/// Title and paragraphs returned for one urn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSection {
    pub title: String,
    pub fulltext: Vec<String>,
}

/// Failure while retrieving one urn.
#[derive(Debug)]
pub enum FetchError {
    /// Transport-level failure (DNS, TLS, timeout, ...).
    Http { urn: String, source: reqwest::Error },
    /// Non-success HTTP status.
    Status { urn: String, status: u16 },
    /// Body is not the expected JSON shape.
    Decode {
        urn: String,
        source: serde_json::Error,
    },
    /// The API answered with an error object.
    Api {
        urn: String,
        code: String,
        description: String,
    },
}

impl FetchError {
    /// The urn whose retrieval failed.
    pub fn urn(&self) -> &str {
        match self {
            Self::Http { urn, .. }
            | Self::Status { urn, .. }
            | Self::Decode { urn, .. }
            | Self::Api { urn, .. } => urn,
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { urn, source } => write!(f, "request for `{urn}` failed: {source}"),
            Self::Status { urn, status } => {
                write!(f, "request for `{urn}` returned HTTP status {status}")
            }
            Self::Decode { urn, source } => {
                write!(f, "unexpected response body for `{urn}`: {source}")
            }
            Self::Api {
                urn,
                code,
                description,
            } => write!(f, "text API rejected `{urn}`: {code} {description}"),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Anything that can turn a urn into section text.
pub trait SectionSource {
    fn fetch_section(&self, urn: &str) -> FetchResult<FetchedSection>;
}

impl<S: SectionSource + ?Sized> SectionSource for &S {
    fn fetch_section(&self, urn: &str) -> FetchResult<FetchedSection> {
        (**self).fetch_section(urn)
    }
}

/// Fetches every urn of `entry` and builds one unsaved book.
pub fn fetch_book<S: SectionSource + ?Sized>(
    source: &S,
    entry: &BookEntry,
) -> FetchResult<Book> {
    let sections = entry
        .urns
        .iter()
        .map(|urn| {
            source.fetch_section(urn).map(|fetched| {
                let paragraphs = fetched
                    .fulltext
                    .into_iter()
                    .map(|paragraph| paragraph.replace('\0', ""))
                    .collect();
                Section::new(urn.as_str(), fetched.title, paragraphs)
            })
        })
        .collect::<FetchResult<Vec<_>>>()?;

    Ok(Book::new(entry.title.as_str(), sections))
}
