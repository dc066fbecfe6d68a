//! Citation projections returned by store reads.

use std::fmt::{Display, Formatter};

/// One quotable paragraph together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub book_title: String,
    pub section_title: String,
    pub text: String,
}

/// A paragraph found inside a known book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionQuote {
    pub section_title: String,
    pub text: String,
}

impl SectionQuote {
    /// Attaches the book title the lookup was constrained to.
    pub fn into_quote(self, book_title: impl Into<String>) -> Quote {
        Quote {
            book_title: book_title.into(),
            section_title: self.section_title,
            text: self.text,
        }
    }
}

/// Renders `text ── 《book》` or `text ── 《book‧section》`.
///
/// The section part is omitted when it repeats the book title, which is the
/// case for single-section books.
impl Display for Quote {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.book_title == self.section_title {
            write!(f, "{} ── 《{}》", self.text, self.book_title)
        } else {
            write!(
                f,
                "{} ── 《{}‧{}》",
                self.text, self.book_title, self.section_title
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Quote, SectionQuote};

    #[test]
    fn citation_omits_section_equal_to_book() {
        let quote = Quote {
            book_title: "道德經".to_string(),
            section_title: "道德經".to_string(),
            text: "道可道，非常道。".to_string(),
        };
        assert_eq!(quote.to_string(), "道可道，非常道。 ── 《道德經》");
    }

    #[test]
    fn citation_joins_book_and_section() {
        let quote = SectionQuote {
            section_title: "學而".to_string(),
            text: "學而時習之".to_string(),
        }
        .into_quote("論語");
        assert_eq!(quote.to_string(), "學而時習之 ── 《論語‧學而》");
    }
}
